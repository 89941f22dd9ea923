use super::*;

fn entry(id: &str) -> RepoEntry {
    RepoEntry { repo_id: id.to_string(), path: PathBuf::from(format!("/repos/{id}")), default_branch: "main".to_string(), remote_name: Some("origin".to_string()) }
}

#[test]
fn resolve_falls_back_to_default() {
    let mut registry = RepoRegistry::new();
    registry.register(entry(DEFAULT_REPO_ID));
    let resolved = registry.resolve(None).unwrap();
    assert_eq!(resolved.repo_id, DEFAULT_REPO_ID);
}

#[test]
fn resolve_explicit_repo_id() {
    let mut registry = RepoRegistry::new();
    registry.register(entry("acme/widgets"));
    let resolved = registry.resolve(Some("acme/widgets")).unwrap();
    assert_eq!(resolved.path, PathBuf::from("/repos/acme/widgets"));
}

#[test]
fn unknown_repo_id_errors() {
    let registry = RepoRegistry::new();
    let err = registry.resolve(Some("nope")).unwrap_err();
    assert_eq!(err, RepoRegistryError::NotFound("nope".to_string()));
}
