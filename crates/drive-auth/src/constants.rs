//! Google OAuth constants for installed-application clients

/// Consent page the operator opens in a browser
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Out-of-band redirect: the consent page shows the code for manual pasting
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Full read/write Drive access
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Token type assumed when the endpoint or token file omits one
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
