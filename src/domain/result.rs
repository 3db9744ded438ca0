//! Result type alias for geosync

use super::errors::GeosyncError;

/// Result type alias for geosync operations
///
/// # Examples
///
/// ```
/// use geosync::domain::result::Result;
/// use geosync::domain::errors::GeosyncError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(GeosyncError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, GeosyncError>;
