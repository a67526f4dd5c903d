/// Constants shared across the assetgate workspace
// Environment variable names
pub const ASSETGATE_PROTECTED_HOSTS_VAR: &str = "ASSETGATE_PROTECTED_HOSTS";
pub const ASSETGATE_CREDENTIAL_ENDPOINT_VAR: &str = "ASSETGATE_CREDENTIAL_ENDPOINT";
pub const ASSETGATE_GATE_CAPACITY_VAR: &str = "ASSETGATE_GATE_CAPACITY";
pub const ASSETGATE_REFRESH_BUFFER_MS_VAR: &str = "ASSETGATE_REFRESH_BUFFER_MS";
pub const ASSETGATE_DEFAULT_TTL_MS_VAR: &str = "ASSETGATE_DEFAULT_TTL_MS";
pub const ASSETGATE_MAX_RETRIES_VAR: &str = "ASSETGATE_MAX_RETRIES";
pub const ASSETGATE_RETRY_BASE_DELAY_MS_VAR: &str = "ASSETGATE_RETRY_BASE_DELAY_MS";
pub const ASSETGATE_FALLBACK_REFERENCE_VAR: &str = "ASSETGATE_FALLBACK_REFERENCE";

// Configuration defaults
pub const DEFAULT_GATE_CAPACITY: usize = 6;
pub const DEFAULT_REFRESH_BUFFER_MS: u64 = 30_000;
pub const DEFAULT_CREDENTIAL_TTL_MS: u64 = 240_000;
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

// Deterministic fallback returned to the rendering layer when resolution fails
pub const DEFAULT_FALLBACK_REFERENCE: &str = "about:blank#asset-unavailable";

// URI scheme for locally resolved handles
pub const LOCAL_HANDLE_SCHEME: &str = "mem://asset/";
