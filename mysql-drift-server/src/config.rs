use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mysql_drift::RestartPolicy;
use time::ext::NumericalStdDuration as _;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum WatchRestart {
    /// Leave the node cache frozen once the watch fails
    #[default]
    Never,
    /// Re-open the watch with exponential backoff
    Backoff,
}

#[derive(Debug, Parser)]
#[command(name = "mysql-drift-server", version, about)]
pub(crate) struct Config {
    /// HTTP listen address
    #[arg(long, env = "DRIFT_LISTEN", default_value = "0.0.0.0:8080")]
    pub(crate) listen: SocketAddr,

    /// Delay between attempts to list nodes at startup, in seconds
    #[arg(long, env = "DRIFT_INITIALIZE_RETRY_SECS", default_value_t = 5)]
    pub(crate) initialize_retry_secs: u64,

    /// What to do when the node watch fails
    #[arg(long, env = "DRIFT_WATCH_RESTART", value_enum, default_value_t = WatchRestart::Never)]
    pub(crate) watch_restart: WatchRestart,

    /// First watch restart delay, in seconds
    #[arg(long, env = "DRIFT_BACKOFF_INITIAL_SECS", default_value_t = 1)]
    pub(crate) backoff_initial_secs: u64,

    /// Longest watch restart delay, in seconds
    #[arg(long, env = "DRIFT_BACKOFF_MAX_SECS", default_value_t = 60)]
    pub(crate) backoff_max_secs: u64,

    /// Forget nodes once the cluster reports them deleted
    #[arg(long, env = "DRIFT_PRUNE_DELETED_NODES")]
    pub(crate) prune_deleted_nodes: bool,

    /// Check for drifted pods at this period, in seconds
    #[arg(long, env = "DRIFT_RECONCILE_INTERVAL_SECS")]
    pub(crate) reconcile_interval_secs: Option<u64>,

    /// Evict and delete drifted pods found by the reconcile loop
    #[arg(long, env = "DRIFT_EVICT")]
    pub(crate) evict: bool,
}

impl Config {
    pub(crate) fn restart_policy(&self) -> RestartPolicy {
        match self.watch_restart {
            WatchRestart::Never => RestartPolicy::Never,
            WatchRestart::Backoff => RestartPolicy::Backoff {
                initial: self.backoff_initial_secs.std_seconds(),
                max: self.backoff_max_secs.std_seconds(),
            },
        }
    }

    pub(crate) fn initialize_retry(&self) -> Duration {
        self.initialize_retry_secs.max(1).std_seconds()
    }

    pub(crate) fn reconcile_interval(&self) -> Option<Duration> {
        self.reconcile_interval_secs
            .filter(|secs| *secs > 0)
            .map(|secs| secs.std_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["mysql-drift-server"]).unwrap();

        assert_eq!(config.listen, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.restart_policy(), RestartPolicy::Never);
        assert!(!config.prune_deleted_nodes);
        assert!(!config.evict);
        assert_eq!(config.reconcile_interval(), None);
        assert_eq!(config.initialize_retry(), Duration::from_secs(5));
    }

    #[test]
    fn initialize_retry_is_at_least_one_second() {
        let config =
            Config::try_parse_from(["mysql-drift-server", "--initialize-retry-secs", "0"])
                .unwrap();
        assert_eq!(config.initialize_retry(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_restart_policy() {
        let config = Config::try_parse_from([
            "mysql-drift-server",
            "--watch-restart",
            "backoff",
            "--backoff-initial-secs",
            "2",
            "--backoff-max-secs",
            "30",
        ])
        .unwrap();

        assert_eq!(
            config.restart_policy(),
            RestartPolicy::Backoff {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn reconcile_flags() {
        let config = Config::try_parse_from([
            "mysql-drift-server",
            "--reconcile-interval-secs",
            "15",
            "--evict",
            "--prune-deleted-nodes",
        ])
        .unwrap();

        assert_eq!(config.reconcile_interval(), Some(Duration::from_secs(15)));
        assert!(config.evict);
        assert!(config.prune_deleted_nodes);
    }

    #[test]
    fn zero_interval_disables_reconcile() {
        let config =
            Config::try_parse_from(["mysql-drift-server", "--reconcile-interval-secs", "0"])
                .unwrap();
        assert_eq!(config.reconcile_interval(), None);
    }

    #[test]
    fn rejects_unknown_restart_policy() {
        assert!(
            Config::try_parse_from(["mysql-drift-server", "--watch-restart", "always"]).is_err()
        );
    }
}
