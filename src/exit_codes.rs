//! Exit code constants for the mswarm CLI.
//!
//! - 0: Success (including runs where teardown or sweep had failures)
//! - 1: User error (bad args, invalid settings)
//! - 2: Credential provisioning failure (strict mode only)
//! - 3: Instance config/launch failure (abort-on-error mode only)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid settings file.
pub const USER_ERROR: i32 = 1;

/// The credential tool failed and strict credentials were requested.
pub const PROVISION_FAILURE: i32 = 2;

/// An instance could not be built or launched and the run was set to abort.
pub const INSTANCE_FAILURE: i32 = 3;
