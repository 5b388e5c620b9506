//! System-wide constants and default paths.

/// Default root for per-container metadata (`config.json`, `container.log`).
pub const DEFAULT_INFO_ROOT: &str = "/var/run/burrow";

/// Default root for per-container overlay layers.
pub const DEFAULT_OVERLAY_ROOT: &str = "/var/lib/burrow/overlay2";

/// Default directory holding `<image>.tar` archives.
pub const DEFAULT_IMAGE_ROOT: &str = "/var/lib/burrow/image";

/// Environment variable overriding the metadata root.
pub const ENV_INFO_ROOT: &str = "BURROW_INFO_ROOT";
/// Environment variable overriding the overlay root.
pub const ENV_OVERLAY_ROOT: &str = "BURROW_OVERLAY_ROOT";
/// Environment variable overriding the image root.
pub const ENV_IMAGE_ROOT: &str = "BURROW_IMAGE_ROOT";

/// Name of the persisted container record inside its metadata directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the redirected stdout file for detached containers.
pub const LOG_FILE_NAME: &str = "container.log";

/// Name of the runtime's node under the cgroup2 mount.
pub const CGROUP_NAME: &str = "burrow";

/// Hidden sub-command that selects the in-container init mode.
pub const INIT_SUBCOMMAND: &str = "init";

/// Host PID of the container to enter; selects the namespace-entry mode.
pub const ENV_EXEC_PID: &str = "BURROW_EXEC_PID";

/// Command line to run after entering the container's namespaces.
pub const ENV_EXEC_CMD: &str = "BURROW_EXEC_CMD";

/// Descriptor on which init reads the command line (first after stdio).
pub const COMMAND_PIPE_FD: i32 = 3;

/// Length of generated container IDs.
pub const CONTAINER_ID_LEN: usize = 10;

/// `chrono` format of `created_time` in container records.
pub const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "burrow";
