use super::*;

use std::fs;
use tempfile::tempdir;

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn resolve_plain(files: &[PathBuf]) -> ResolvedFileSet {
    resolve_files(files, &VersionSpec::any(), &BTreeMap::new()).unwrap()
}

fn winner_paths(set: &ResolvedFileSet) -> Vec<String> {
    set.paths()
        .map(|p| slash_path(p))
        .collect()
}

#[test]
fn test_parse_unversioned() {
    let candidate = parse_candidate(Path::new("compose/web.yaml")).unwrap();
    assert_eq!(candidate.name, "compose/web");
    assert_eq!(candidate.version, None);
}

#[test]
fn test_parse_versioned_variants() {
    for (file, expected_name, expected_version) in [
        ("compose/web.v2.1.yaml", "compose/web", "2.1"),
        ("compose/db_v1.0.3.yml", "compose/db", "1.0.3"),
        ("compose/cache@v3.yaml", "compose/cache", "3"),
        ("compose/proxy:v1.5a0.yaml", "compose/proxy", "1.5a0"),
    ] {
        let candidate = parse_candidate(Path::new(file)).unwrap();
        assert_eq!(candidate.name, expected_name, "{}", file);
        assert_eq!(
            candidate.version,
            Some(expected_version.parse().unwrap()),
            "{}",
            file
        );
    }
}

#[test]
fn test_parse_strips_template_suffix() {
    let candidate = parse_candidate(Path::new("compose/web.v2.yaml.j2")).unwrap();
    assert_eq!(candidate.name, "compose/web");
    assert_eq!(candidate.version, Some("2".parse().unwrap()));
}

#[test]
fn test_parse_dotted_name_without_version() {
    let candidate = parse_candidate(Path::new("compose/web.env.yaml")).unwrap();
    assert_eq!(candidate.name, "compose/web.env");
    assert_eq!(candidate.version, None);
}

#[test]
fn test_parse_malformed_version_is_an_error() {
    let err = parse_candidate(Path::new("compose/web.v99999999999999999999.yaml")).unwrap_err();
    assert!(matches!(err, ComposeError::MalformedVersion { .. }));
}

#[test]
fn test_logical_file_stem_ignores_directories() {
    assert_eq!(logical_file_stem(Path::new("compose/traefik.v2.plug")), "traefik");
    assert_eq!(logical_file_stem(Path::new("traefik.plug")), "traefik");
}

#[test]
fn test_versioned_beats_unversioned() {
    let set = resolve_plain(&paths(&["compose/web.yaml", "compose/web.v2.yaml"]));
    assert_eq!(winner_paths(&set), ["compose/web.v2.yaml"]);
}

#[test]
fn test_highest_version_wins() {
    let set = resolve_plain(&paths(&[
        "compose/web.v1.yaml",
        "compose/web.v2.1.yaml",
        "compose/web.v2.0.9.yaml",
    ]));
    assert_eq!(winner_paths(&set), ["compose/web.v2.1.yaml"]);
}

#[test]
fn test_constraint_falls_back_to_unversioned() {
    let files = paths(&["compose/web.yaml", "compose/web.v2.yaml"]);
    let spec: VersionSpec = "<2.0.0".parse().unwrap();
    let set = resolve_files(&files, &spec, &BTreeMap::new()).unwrap();
    assert_eq!(winner_paths(&set), ["compose/web.yaml"]);
}

#[test]
fn test_unversioned_is_never_constraint_filtered() {
    let files = paths(&["compose/web.yaml"]);
    let spec: VersionSpec = ">=5.0".parse().unwrap();
    let set = resolve_files(&files, &spec, &BTreeMap::new()).unwrap();
    assert_eq!(winner_paths(&set), ["compose/web.yaml"]);
}

#[test]
fn test_constraints_dual_gate() {
    let files = paths(&["compose/web.v1.5.yaml", "compose/web.v2.5.yaml"]);

    // Global allows both; the name-specific spec must ALSO pass.
    let global: VersionSpec = ">=1.0".parse().unwrap();
    let mut mapping = BTreeMap::new();
    mapping.insert("compose/web".to_string(), "<2.0".parse().unwrap());
    let set = resolve_files(&files, &global, &mapping).unwrap();
    assert_eq!(winner_paths(&set), ["compose/web.v1.5.yaml"]);

    // The name-specific spec alone is not enough either.
    let narrow_global: VersionSpec = ">=2.0".parse().unwrap();
    let mut wide_mapping = BTreeMap::new();
    wide_mapping.insert("compose/web".to_string(), ">=0".parse().unwrap());
    let set = resolve_files(&files, &narrow_global, &wide_mapping).unwrap();
    assert_eq!(winner_paths(&set), ["compose/web.v2.5.yaml"]);
}

#[test]
fn test_equal_versions_first_in_sorted_order_wins() {
    // `web.v2.yaml` and `web_v2.yaml` share name and version; the
    // lexicographically smaller path is encountered first and kept.
    let set = resolve_plain(&paths(&["compose/web_v2.yaml", "compose/web.v2.yaml"]));
    assert_eq!(winner_paths(&set), ["compose/web.v2.yaml"]);
}

#[test]
fn test_same_stem_in_different_directories_stays_distinct() {
    let set = resolve_plain(&paths(&["a/web.yaml", "b/web.yaml"]));
    assert_eq!(winner_paths(&set), ["a/web.yaml", "b/web.yaml"]);
}

#[test]
fn test_output_order_is_sorted_by_path() {
    let set = resolve_plain(&paths(&[
        "compose/z.yaml",
        "compose/a.yaml",
        "compose/m.v2.yaml",
    ]));
    assert_eq!(
        winner_paths(&set),
        ["compose/a.yaml", "compose/m.v2.yaml", "compose/z.yaml"]
    );
}

#[test]
fn test_resolution_is_deterministic_under_input_shuffles() {
    let files = paths(&[
        "compose/web.yaml",
        "compose/web.v2.yaml",
        "compose/db.v1.yaml",
        "compose/db.v1.0.yaml",
        "compose/cache.yaml",
    ]);

    let baseline = resolve_plain(&files);
    let mut shuffled = files.clone();
    shuffled.reverse();
    assert_eq!(resolve_plain(&shuffled), baseline);

    shuffled.rotate_left(2);
    assert_eq!(resolve_plain(&shuffled), baseline);
}

#[test]
fn test_resolve_from_disk_twice_is_identical() {
    let dir = tempdir().unwrap();
    for name in ["web.yaml", "web.v2.yaml", "db.v1.2.yaml", "db.v1.10.yaml"] {
        fs::write(dir.path().join(name), "services: {}\n").unwrap();
    }

    let spec = SourceSpec {
        dir: dir.path().to_path_buf(),
        ..SourceSpec::default()
    };
    let first = resolve(&spec).unwrap();
    let second = resolve(&spec).unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    let winners: Vec<String> = first
        .paths()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(winners.contains(&"db.v1.10.yaml".to_string()));
    assert!(winners.contains(&"web.v2.yaml".to_string()));
}
