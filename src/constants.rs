pub(crate) const REGISTRY_DIR: &str = "wtask";
pub(crate) const REGISTRY_FILE: &str = "config.toml";

pub(crate) const DEFAULT_BRANCH: &str = "main";
pub(crate) const DEFAULT_BRANCH_PREFIX: &str = "feature";
pub(crate) const DEFAULT_WORKTREES_DIR: &str = "worktrees";

pub(crate) const MAX_BRANCH_SLUG_CHARS: usize = 60;

pub(crate) const TASK_ID_PREFIX: &str = "wt";

pub(crate) const PSEUDO_RANDOM_MIX_A: u64 = 0x9E37_79B9_7F4A_7C15;
pub(crate) const PSEUDO_RANDOM_MIX_B: u64 = 0xFF51_AFD7_ED55_8CCD;

pub(crate) const LIST_DESCRIPTION_MAX_CHARS: usize = 40;
pub(crate) const SYNC_SUMMARY_MAX_CHARS: usize = 50;
pub(crate) const TRUNCATE_ELLIPSIS_CHARS: usize = 3;

pub(crate) const JIRA_SEARCH_MAX_RESULTS: u32 = 50;

pub(crate) const AGENT_ENV_VAR: &str = "WTASK_AGENT";
