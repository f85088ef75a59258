use super::*;

#[test]
fn config_dir_ends_with_app_name() {
    let dir = get_config_dir().expect("should resolve a config directory");
    assert!(dir.ends_with("docqa"), "unexpected config dir: {:?}", dir);
}
