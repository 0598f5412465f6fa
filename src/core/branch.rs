//! Branch classification

use std::fmt;

/// The branches the stage policy knows about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchKind {
    /// Integration branch: build, test and analyse only
    Develop,
    /// Pre-release branch: scans, `test-{build}` images, archived artifacts
    Test,
    /// Release branch: blocking quality gate and scans, production images
    Prod,
    /// Any branch without its own policy
    Other(String),
}

impl BranchKind {
    /// Classify a branch name as reported by the SCM or the orchestrator.
    ///
    /// `refs/heads/` and `origin/` prefixes are stripped before matching, so
    /// `origin/prod` and `refs/heads/prod` both classify as [`BranchKind::Prod`].
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let short = trimmed.strip_prefix("refs/heads/").unwrap_or(trimmed);
        let short = short.strip_prefix("origin/").unwrap_or(short);

        match short {
            "develop" => BranchKind::Develop,
            "test" => BranchKind::Test,
            "prod" => BranchKind::Prod,
            other => BranchKind::Other(other.to_string()),
        }
    }

    /// Short branch name
    pub fn name(&self) -> &str {
        match self {
            BranchKind::Develop => "develop",
            BranchKind::Test => "test",
            BranchKind::Prod => "prod",
            BranchKind::Other(name) => name,
        }
    }

    /// Whether this branch has an entry of its own in the policy table
    pub fn is_known(&self) -> bool {
        !matches!(self, BranchKind::Other(_))
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_branches() {
        assert_eq!(BranchKind::parse("develop"), BranchKind::Develop);
        assert_eq!(BranchKind::parse("test"), BranchKind::Test);
        assert_eq!(BranchKind::parse("prod"), BranchKind::Prod);
    }

    #[test]
    fn test_parse_strips_ref_prefixes() {
        assert_eq!(BranchKind::parse("origin/prod"), BranchKind::Prod);
        assert_eq!(BranchKind::parse("refs/heads/test"), BranchKind::Test);
        assert_eq!(BranchKind::parse("refs/heads/origin/develop"), BranchKind::Develop);
        assert_eq!(BranchKind::parse("  prod\n"), BranchKind::Prod);
    }

    #[test]
    fn test_parse_other_branch() {
        let branch = BranchKind::parse("feature/login");
        assert_eq!(branch, BranchKind::Other("feature/login".to_string()));
        assert!(!branch.is_known());
        assert_eq!(branch.to_string(), "feature/login");
    }

    #[test]
    fn test_match_is_exact() {
        assert!(matches!(BranchKind::parse("production"), BranchKind::Other(_)));
        assert!(matches!(BranchKind::parse("Prod"), BranchKind::Other(_)));
    }
}
