pub mod management;
pub mod oidc;
pub mod session;
pub mod verifier;

pub use management::{
    ManagementApi, ManagementApiError, ManagementCredentials, ManagementToken, ManagementTokenCache,
    RequestScope, TokenRefreshError, VerificationEmailJob,
};
pub use oidc::{OidcError, OidcSettings};
pub use session::{SessionClaims, SessionError, SessionUser};
pub use verifier::{
    issue_token, verify_and_decode_token, IdentityRef, TokenVerificationError, VerificationClaims,
};
