//! Property-based tests for repository references and manifest rewriting.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::cache::entry_name;
    use crate::manifest::{gemfile, package_json};
    use crate::refspec::{self, GitRef, RefKind};
    use proptest::prelude::*;
    use std::path::PathBuf;

    const ORG: &str = "[a-z][a-z0-9]{0,8}";
    const NAME: &str = "[a-z][a-z0-9_-]{0,12}";
    const BRANCH: &str = "[a-z][a-z0-9-]{0,10}(/[a-z][a-z0-9]{0,6})?";
    const TAG: &str = "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}";
    const LOCAL_PATH: &str = "(/[a-z][a-z0-9_]{0,7}){1,4}";

    // ============================================================================
    // refspec::parse property tests
    // ============================================================================

    proptest! {
        /// Property: parse never panics, whatever the input
        #[test]
        fn parse_never_panics(input in ".*") {
            let _ = refspec::parse(&input);
        }

        /// Property: a well-formed branch spec parses and renders back unchanged
        #[test]
        fn branch_spec_display_round_trips(org in ORG, name in NAME, branch in BRANCH) {
            let input = format!("{org}/{name}#{branch}");
            let spec = refspec::parse(&input).unwrap();
            prop_assert_eq!(spec.org(), org.as_str());
            prop_assert_eq!(spec.name(), name.as_str());
            prop_assert_eq!(spec.ref_kind(), Some(RefKind::Branch));
            prop_assert_eq!(spec.to_string(), input);
        }

        /// Property: '@' always selects a tag
        #[test]
        fn tag_spec_is_tag(org in ORG, name in NAME, tag in TAG) {
            let spec = refspec::parse(&format!("{org}/{name}@{tag}")).unwrap();
            prop_assert_eq!(spec.reference(), Some(&GitRef::Tag(tag)));
        }

        /// Property: a ref containing a space is rejected
        #[test]
        fn ref_with_space_is_rejected(
            org in ORG,
            name in NAME,
            left in "[a-z]{1,5}",
            right in "[a-z]{1,5}",
        ) {
            let input = format!("{org}/{name}#{left} {right}");
            prop_assert!(refspec::parse(&input).is_err());
        }

        /// Property: a repository without a slash is rejected
        #[test]
        fn repository_without_slash_is_rejected(name in NAME) {
            prop_assert!(refspec::parse(&name).is_err());
        }

        /// Property: cache entry names are a single path segment
        #[test]
        fn cache_entry_name_is_one_segment(org in ORG, name in NAME, branch in BRANCH) {
            let spec = refspec::parse(&format!("{org}/{name}#{branch}")).unwrap();
            let entry = entry_name(&spec);
            prop_assert!(!entry.contains('/'));
            let expected_prefix = format!("{}-{}-", org, name);
            prop_assert!(entry.starts_with(&expected_prefix));
        }
    }

    // ============================================================================
    // Rewriter idempotence property tests
    // ============================================================================

    proptest! {
        /// Property: rewriting a Gemfile to a local path twice equals rewriting once
        #[test]
        fn gemfile_local_rewrite_is_idempotent(
            version in "[0-9]{1,2}\\.[0-9]{1,2}",
            path in LOCAL_PATH,
            single_quotes in any::<bool>(),
        ) {
            let q = if single_quotes { '\'' } else { '"' };
            let content = format!(
                "source {q}https://rubygems.org{q}\n\ngem {q}rails{q}, {q}~> 7.1{q}\ngem {q}shakapacker{q}, {q}~> {version}{q}\n"
            );
            let path = PathBuf::from(path);
            let once = gemfile::rewrite_to_local(&content, "shakapacker", &path).unwrap();
            let twice = gemfile::rewrite_to_local(&once, "shakapacker", &path).unwrap();
            prop_assert_eq!(&once, &twice);
            let expected_rails = format!("gem {q}rails{q}, {q}~> 7.1{q}\n");
            prop_assert!(once.contains(&expected_rails));
        }

        /// Property: rewriting a Gemfile to GitHub twice equals rewriting once
        #[test]
        fn gemfile_remote_rewrite_is_idempotent(org in ORG, branch in BRANCH) {
            let content = "gem \"react_on_rails\", \"14.0.0\"\n";
            let spec = refspec::parse(&format!("{org}/react_on_rails#{branch}")).unwrap();
            let once = gemfile::rewrite_to_remote(content, "react_on_rails", &spec).unwrap();
            let twice = gemfile::rewrite_to_remote(&once, "react_on_rails", &spec).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// Property: rewriting package.json twice equals rewriting once, and the
        /// second pass reports no modified groups
        #[test]
        fn package_json_rewrite_is_idempotent(
            version in "\\^[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
            path in LOCAL_PATH,
            dev in any::<bool>(),
        ) {
            let group = if dev { "devDependencies" } else { "dependencies" };
            let content = format!(
                "{{\n  \"name\": \"demo\",\n  \"{group}\": {{\n    \"react\": \"^18.2.0\",\n    \"shakapacker\": \"{version}\"\n  }}\n}}\n"
            );
            let path = PathBuf::from(path);
            let once = package_json::rewrite_to_local(&content, "shakapacker", &path).unwrap();
            prop_assert_eq!(once.modified_groups.clone(), vec![group.to_string()]);
            let twice = package_json::rewrite_to_local(&once.content, "shakapacker", &path).unwrap();
            prop_assert!(!twice.is_modified());
            prop_assert_eq!(once.content, twice.content);
        }
    }
}
