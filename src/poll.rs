use crate::err::SdError;

/// Spin until `ready` reports true.
///
/// Returns the number of failed polls before success. With `limit` set the
/// loop gives up with [`SdError::Timeout`] after that many failed polls;
/// `None` waits forever, which is how the data-phase waits behave unless a
/// bound is configured.
pub fn poll_until<F>(limit: Option<u32>, mut ready: F) -> Result<u32, SdError>
where
    F: FnMut() -> bool,
{
    let mut count: u32 = 0;
    loop {
        if ready() {
            return Ok(count);
        }
        if let Some(max) = limit {
            if count >= max {
                return Err(SdError::Timeout);
            }
        }
        count = count.saturating_add(1);
        core::hint::spin_loop();
    }
}
