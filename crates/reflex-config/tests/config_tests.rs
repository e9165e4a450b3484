#[cfg(test)]
mod tests {
    use reflex_config::ConfigLoader;
    use reflex_config::schema::*;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_reflex_config_defaults() {
        let config = ReflexConfig::default();
        assert_eq!(config.mission.name, "mission");
        assert_eq!(config.mission.final_tick, None);
        assert_eq!(config.mission.tick_millis, 1000);
        assert_eq!(config.agent.latency, 0);
        assert_eq!(config.agent.lookahead, Some(1));
    }

    #[test]
    fn test_logging_section_defaults() {
        let config = LoggingSection::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
        assert!(config.file.is_none());
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = ReflexConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: ReflexConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.mission.name, config.mission.name);
        assert_eq!(restored.mission.tick_millis, config.mission.tick_millis);
        assert_eq!(restored.agent.lookahead, config.agent.lookahead);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [mission]
            name = "survey"
            final_tick = 600
        "#;
        let config: ReflexConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.mission.name, "survey");
        assert_eq!(config.mission.final_tick, Some(600));
        assert_eq!(config.mission.tick_millis, 1000);
        assert_eq!(config.agent.max_steps_per_tick, 200);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_validate_defaults_has_no_errors() {
        let config = ReflexConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_tick_millis_is_error() {
        let mut config = ReflexConfig::default();
        config.mission.tick_millis = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_final_tick_is_error() {
        let mut config = ReflexConfig::default();
        config.mission.final_tick = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unbounded_lookahead_open_mission_warns() {
        let mut config = ReflexConfig::default();
        config.agent.lookahead = None;
        config.mission.final_tick = None;
        let warnings = config.validate().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.field == "agent.lookahead"
                    && w.severity == WarningSeverity::Warning)
        );
    }

    #[test]
    fn test_validate_unknown_log_level_warns() {
        let mut config = ReflexConfig::default();
        config.logging.level = "verbose".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "logging.level"));
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflex.toml");
        let loader = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(loader.get().mission.name, "mission");
    }

    #[test]
    fn test_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflex.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[mission]\nname = \"dock-survey\"\ntick_millis = 250").unwrap();
        let loader = ConfigLoader::load(Some(&path)).unwrap();
        let config = loader.get();
        assert_eq!(config.mission.name, "dock-survey");
        assert_eq!(config.mission.tick_millis, 250);
    }

    #[test]
    fn test_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflex.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[mission]\ntick_millis = 0").unwrap();
        assert!(ConfigLoader::load(Some(&path)).is_err());
    }

    #[test]
    fn test_resolve_path_explicit_wins() {
        let p = std::path::PathBuf::from("/tmp/custom.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(&p)), p);
    }
}
