/// Router Module Index
///
/// Splits routing into two access tiers. The public module carries the lone
/// unauthenticated endpoint; everything else sits behind the token-verifying
/// middleware layer applied in `create_router`. Finer-grained role and
/// ownership rules are enforced inside the handlers, where the resource is
/// at hand.
/// Routes accessible without a session token.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;
