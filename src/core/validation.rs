//! Settings validation support.

use crate::error::ValidationError;

/// Trait for settings validation.
///
/// Implemented by [`ClusterSettings`](crate::core::ClusterSettings); the
/// builder runs it before a dispatcher is created so a bad file never
/// reaches the transport.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::core::Validate;
/// use cluster_notify::error::ValidationError;
///
/// struct BrokerSettings {
///     url: String,
/// }
///
/// impl Validate for BrokerSettings {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.url.is_empty() {
///             return Err(ValidationError::invalid_field("url", "must not be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validate {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Should return a `ValidationError` describing what validation failed.
    fn validate(&self) -> Result<(), ValidationError>;
}
