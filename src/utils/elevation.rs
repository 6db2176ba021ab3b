// src/utils/elevation.rs

/// Checks if the current process is running with elevated (administrator) privileges.
///
/// # Returns
///
/// - `true` if the process is elevated.
/// - `false` otherwise, or when the token cannot be queried.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows::Win32::{
        Foundation::{CloseHandle, HANDLE},
        Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
        System::Threading::{GetCurrentProcess, OpenProcessToken},
    };

    struct TokenGuard(HANDLE);

    impl Drop for TokenGuard {
        fn drop(&mut self) {
            if let Err(e) = unsafe { CloseHandle(self.0) } {
                tracing::warn!("CloseHandle failed for process token: {:?}", e);
            }
        }
    }

    let mut handle = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle) }.is_err() {
        return false;
    }
    let token = TokenGuard(handle);

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut ret_size = 0u32;
    let queried = unsafe {
        GetTokenInformation(
            token.0,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_size,
        )
    };

    queried.is_ok() && elevation.TokenIsElevated != 0
}

/// There is no elevation concept to query outside Windows.
#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}
