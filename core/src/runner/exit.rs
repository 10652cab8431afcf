use std::process::ExitStatus;

/// Maps a process status to a single code; a signal death reads as `128 + n`.
pub fn normalize_exit(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

/// True when the process ended on its own with an exit code, as opposed to
/// being killed by a signal nobody on this side sent.
pub fn exited_normally(status: &ExitStatus) -> bool {
    status.code().is_some()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn signals_map_above_128() {
        assert_eq!(normalize_exit(ExitStatus::from_raw(9)), 137);
        assert!(!exited_normally(&ExitStatus::from_raw(9)));
    }

    #[test]
    fn exit_codes_pass_through() {
        assert_eq!(normalize_exit(ExitStatus::from_raw(3 << 8)), 3);
        assert!(exited_normally(&ExitStatus::from_raw(0)));
    }
}
