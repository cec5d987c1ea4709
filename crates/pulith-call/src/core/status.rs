/// Whether `status` is in the 2xx range.
///
/// # Examples
///
/// ```
/// use pulith_call::is_successful;
///
/// assert!(is_successful(204));
/// assert!(!is_successful(301));
/// ```
pub fn is_successful(status: u16) -> bool {
    (200..=299).contains(&status)
}
