/// Router Module Index
///
/// Routes are split by access level so the admin gate is applied once, at the
/// module boundary, instead of being repeated per handler.

/// Routes accessible to all visitors (anonymous, read-only news plus login).
pub mod public;

/// Routes restricted to sessions on the admin allow-list.
pub mod admin;
