mod unit;

/// Whether a C compiler usable by the host backend is on `PATH`.
pub fn clang_available() -> bool {
    std::process::Command::new(crate::host::DEFAULT_COMPILER)
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

macro_rules! require_clang {
    () => {
        if !$crate::test::clang_available() {
            eprintln!("clang not available, skipping test");
            return;
        }
    };
}

pub(crate) use require_clang;
