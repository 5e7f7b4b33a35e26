//! User-Agent sent with every request unless the caller overrides it.

/// Product token: crate name and version.
const PRODUCT: &str = concat!("rangefetch/", env!("CARGO_PKG_VERSION"));

/// Builds the default User-Agent, adding the repository link when the package declares one.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    match option_env!("CARGO_PKG_REPOSITORY").filter(|repo| !repo.is_empty()) {
        Some(repo) => format!("{PRODUCT} (+{repo})"),
        None => PRODUCT.to_string(),
    }
}
