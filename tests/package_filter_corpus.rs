//! Package filter correctness corpus tests
//!
//! Each case is an archive entry path and whether the filter must extract it.
//! Listings are modelled on GitHub source archives of published packages.

use eco_classifier::{glob_match, Classification, PackageFilter, PackageRule};

fn any_root() -> PackageFilter {
    PackageFilter::new().unwrap()
}

fn rooted(root: &str) -> PackageFilter {
    PackageFilter::for_root(root).unwrap()
}

// =============================================================================
// Category 1: Accepted entries
// =============================================================================

#[test]
fn test_accepted_top_level_files() {
    let f = any_root();
    for (path, rule) in [
        ("elm-css-16.1.1/README.md", PackageRule::Readme),
        ("elm-css-16.1.1/LICENSE", PackageRule::License),
        ("elm-css-16.1.1/elm.json", PackageRule::Manifest),
    ] {
        assert_eq!(f.classify(path), Classification::Accepted(rule), "{path}");
    }
}

#[test]
fn test_accepted_nested_sources() {
    let f = any_root();
    for path in [
        "elm-css-16.1.1/src/Css.elm",
        "elm-css-16.1.1/src/Css/Global.elm",
        "elm-css-16.1.1/src/Css/Preprocess/Resolve.elm",
        "elm-css-16.1.1/src/Native/Css.js",
        "elm-css-16.1.1/src/",
        "elm-css-16.1.1/src/Css/",
    ] {
        assert_eq!(f.classify(path).rule(), Some(PackageRule::Source), "{path}");
    }
}

#[test]
fn test_accepted_unusual_root_names() {
    let f = any_root();
    assert!(f.is_package_file("elm-ui-1.1.0+meta/elm.json"));
    assert!(f.is_package_file("elm (copy)-1.0.0/src/Main.elm"));
    assert!(f.is_package_file("elm.json-1.0.0/elm.json"));
}

// =============================================================================
// Category 2: Rejected entries
// =============================================================================

#[test]
fn test_rejected_repository_clutter() {
    let f = any_root();
    for path in [
        "elm-css-16.1.1/",
        "elm-css-16.1.1/.gitignore",
        "elm-css-16.1.1/.travis.yml",
        "elm-css-16.1.1/.github/workflows/test.yml",
        "elm-css-16.1.1/package.json",
        "elm-css-16.1.1/CHANGELOG.md",
        "elm-css-16.1.1/README",
        "elm-css-16.1.1/LICENSE.md",
        "elm-css-16.1.1/docs.json",
        "elm-css-16.1.1/tests/Tests.elm",
        "elm-css-16.1.1/tests/elm.json",
        "elm-css-16.1.1/examples/src/Main.elm",
        "elm-css-16.1.1/benchmarks/README.md",
    ] {
        assert_eq!(f.classify(path), Classification::Rejected, "{path}");
    }
}

#[test]
fn test_rejected_build_byproducts() {
    let f = any_root();
    assert!(!f.is_package_file("elm-css-16.1.1/elm-stuff/0.19.1/Css.elmi"));
    assert!(!f.is_package_file("elm-css-16.1.1/elm-stuff/"));
}

#[test]
fn test_rejected_case_variants() {
    let f = any_root();
    for path in [
        "pkg-1.0.0/readme.md",
        "pkg-1.0.0/License",
        "pkg-1.0.0/ELM.JSON",
        "pkg-1.0.0/Src/Main.elm",
    ] {
        assert!(!f.is_package_file(path), "{path}");
    }
}

#[test]
fn test_rejected_without_root_folder() {
    let f = any_root();
    for path in ["elm.json", "README.md", "LICENSE", "src/Main.elm"] {
        assert!(!f.is_package_file(path), "{path}");
    }
}

#[test]
fn test_rejected_deeper_roots() {
    let f = any_root();
    assert!(!f.is_package_file("outer/pkg-1.0.0/elm.json"));
    assert!(!f.is_package_file("outer/pkg-1.0.0/src/Main.elm"));
}

// =============================================================================
// Category 3: Root-scoped filters
// =============================================================================

#[test]
fn test_rooted_filter_accepts_only_its_root() {
    let f = rooted("elm-foo-1.0.0");
    assert!(f.is_package_file("elm-foo-1.0.0/elm.json"));
    assert!(f.is_package_file("elm-foo-1.0.0/src/Foo.elm"));
    assert!(!f.is_package_file("elm-bar-1.0.0/elm.json"));
    assert!(!f.is_package_file("elm-foo-1.0.1/elm.json"));
    assert!(!f.is_package_file("elm-foo-1.0.0-extra/elm.json"));
}

#[test]
fn test_rooted_filter_treats_metacharacters_literally() {
    let f = rooted("elm-[x]*-1.0.0");
    assert!(f.is_package_file("elm-[x]*-1.0.0/elm.json"));
    assert!(!f.is_package_file("elm-x-1.0.0/elm.json"));
    assert!(!f.is_package_file("elm-[x]abc-1.0.0/elm.json"));

    let dotted = rooted("elm.foo-1.0.0");
    assert!(!dotted.is_package_file("elmXfoo-1.0.0/elm.json"));
}

#[test]
fn test_rooted_filter_trailing_slash() {
    assert_eq!(rooted("elm-foo-1.0.0/").root(), "elm-foo-1.0.0");
}

// =============================================================================
// Category 4: Whole listings
// =============================================================================

#[test]
fn test_github_listing() {
    let listing = [
        "elm-foo-1.0.0/",
        "elm-foo-1.0.0/.gitignore",
        "elm-foo-1.0.0/LICENSE",
        "elm-foo-1.0.0/README.md",
        "elm-foo-1.0.0/elm.json",
        "elm-foo-1.0.0/src/",
        "elm-foo-1.0.0/src/Foo.elm",
        "elm-foo-1.0.0/src/Foo/",
        "elm-foo-1.0.0/src/Foo/Bar.elm",
        "elm-foo-1.0.0/tests/",
        "elm-foo-1.0.0/tests/FooTest.elm",
    ];
    assert_eq!(
        rooted("elm-foo-1.0.0").select(listing),
        vec![
            "elm-foo-1.0.0/LICENSE",
            "elm-foo-1.0.0/README.md",
            "elm-foo-1.0.0/elm.json",
            "elm-foo-1.0.0/src/",
            "elm-foo-1.0.0/src/Foo.elm",
            "elm-foo-1.0.0/src/Foo/",
            "elm-foo-1.0.0/src/Foo/Bar.elm",
        ]
    );
}

#[test]
fn test_hostile_listing_selects_nothing_outside_root() {
    let listing = [
        "../elm.json",
        "elm-foo-1.0.0/../../etc/passwd",
        "/etc/elm-foo-1.0.0/elm.json",
        "elm-foo-1.0.0\\elm.json",
        "elm-foo-1.0.0/src/../../planted.txt",
        "elm-foo-1.0.0/src/../tests/Spec.elm",
        "elm-foo-1.0.0/src/./Foo.elm",
    ];
    assert!(rooted("elm-foo-1.0.0").select(listing).is_empty());
}

// =============================================================================
// Category 5: Glob primitives
// =============================================================================

#[test]
fn test_glob_primitives() {
    assert!(glob_match("a/b.elm", "*/*.elm"));
    assert!(!glob_match("a/b/c.elm", "*/*.elm"));
    assert!(glob_match("a/b/c.elm", "a/**/*.elm"));
    assert!(glob_match("a/c.elm", "a/**/*.elm"));
    assert!(glob_match("ab", "a?"));
    assert!(!glob_match("a/", "a?"));
    assert!(glob_match("v1", "v[0-9]"));
    assert!(!glob_match("v/", "v[!a]"));
    assert!(!glob_match("anything", "[unclosed"));
}
