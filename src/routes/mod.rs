/// Router Module Index
///
/// Routes are split by the gate that protects them, so access control is
/// applied once per module as a route layer rather than inside handlers.

/// Unauthenticated routes: health, sign-up, login, contact form.
pub mod public;

/// Routes behind `require_authenticated`. Handlers scope data to the principal.
pub mod authenticated;

/// Routes behind `require_admin`, plus the superadmin-only upload views.
pub mod admin;
