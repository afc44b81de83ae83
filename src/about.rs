pub const CELLTRACK_DISPLAY_VERSION: &str = env!("CELLTRACK_DISPLAY_VERSION");
pub const CELLTRACK_BUILD_N: &str = env!("CELLTRACK_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "celltrack {}\nBuild {}\nCell lineage linking and error checking for time-lapse microscopy",
        CELLTRACK_DISPLAY_VERSION, CELLTRACK_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text_names_build() {
        let text = version_cli_text();
        assert!(text.starts_with("celltrack "));
        assert!(text.contains(CELLTRACK_BUILD_N));
    }
}
