//! Integration tests for grid-intensity

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::io::{BufRead, BufReader};
    use std::process::{Child, Command as StdCommand, Stdio};
    use tempfile::TempDir;

    /// Command isolated from the user's config and credentials
    fn grid_intensity(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("grid-intensity");
        cmd.env("GRID_INTENSITY_CONFIG", dir.path().join("config.toml"))
            .env_remove("WATT_TIME_USER")
            .env_remove("WATT_TIME_PASSWORD")
            .env_remove("ELECTRICITY_MAP_API_TOKEN");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Carbon intensity"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("grid-intensity"));
    }

    #[test]
    fn provider_list_plain() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["provider", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("WattTime")
                    .and(predicate::str::contains("Ember"))
                    .and(predicate::str::contains("CarbonIntensityOrgUK")),
            );
    }

    #[test]
    fn get_single_region_json() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "Ember", "-r", "GBR", "-f", "json"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("\"region\": \"GBR\"")
                    .and(predicate::str::contains("gCO2e per kWh")),
            );
    }

    #[test]
    fn get_many_regions_prints_map() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "ember", "-r", "GBR,FRA,DEU", "-f", "plain"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("GBR ")
                    .and(predicate::str::contains("FRA "))
                    .and(predicate::str::contains("DEU ")),
            );
    }

    #[test]
    fn get_unknown_region_fails() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "Ember", "-r", "GBR,XXX"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("XXX"));
    }

    #[test]
    fn get_without_regions_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "Ember"])
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("no region provided")
                    .and(predicate::str::contains("Hint:")),
            );
    }

    #[test]
    fn unknown_provider_fails() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "Nope", "-r", "GBR"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not recognized"));
    }

    #[test]
    fn watt_time_without_credentials_fails() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "WattTime", "-r", "CAISO_NORTH"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("WATT_TIME_USER"));
    }

    #[test]
    fn config_path_follows_env() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                dir.path().join("config.toml").display().to_string(),
            ));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("[general]")
                    .and(predicate::str::contains("provider = \"Ember\"")),
            );
    }

    #[test]
    fn config_set_then_get_uses_saved_regions() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["config", "set", "general.regions", "FRA,DEU"])
            .assert()
            .success();

        grid_intensity(&dir)
            .args(["get", "-f", "json"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("\"FRA\"").and(predicate::str::contains("\"DEU\"")),
            );
    }

    #[test]
    fn get_save_persists_provider_and_regions() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["get", "-p", "ember", "-r", "IND", "-f", "plain", "--save"])
            .assert()
            .success();

        let saved = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(saved.contains("provider = \"Ember\""));
        assert!(saved.contains("IND"));
    }

    #[test]
    fn exporter_without_regions_fails() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["exporter", "-p", "Ember", "--address", "127.0.0.1:0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no region provided"));
    }

    /// Kills the exporter when the test ends, pass or fail
    struct Running(Child);

    impl Drop for Running {
        fn drop(&mut self) {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }

    #[test]
    fn exporter_serves_ember_gauges() {
        let dir = TempDir::new().unwrap();
        let mut child = StdCommand::new(env!("CARGO_BIN_EXE_grid-intensity"))
            .args(["exporter", "-p", "Ember", "-r", "GBR,ESP", "--address", "127.0.0.1:0"])
            .env("GRID_INTENSITY_CONFIG", dir.path().join("config.toml"))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let _running = Running(child);

        let url = BufReader::new(stdout)
            .lines()
            .map(Result::unwrap)
            .find_map(|line| {
                let start = line.find("http://")?;
                let url: String = line[start..]
                    .chars()
                    .take_while(|c| !c.is_whitespace() && *c != '\x1b')
                    .collect();
                Some(url)
            })
            .unwrap();

        let body = ureq::get(&url)
            .call()
            .unwrap()
            .body_mut()
            .read_to_string()
            .unwrap();

        assert!(body.contains("grid_intensity_carbon_average{"));
        assert!(body.contains("region=\"GBR\""));
        assert!(body.contains("268.255"));
        assert!(body.contains("193.737"));
    }

    #[test]
    fn cache_list_without_file_warns() {
        let dir = TempDir::new().unwrap();
        grid_intensity(&dir)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache file configured"));
    }

    #[test]
    fn cache_list_and_clear_with_file() {
        let dir = TempDir::new().unwrap();
        let cache_file = dir.path().join("cache.json");
        std::fs::write(
            &cache_file,
            r#"{"CAISO_NORTH":{"data":{"ba":"CAISO_NORTH"},"ttl":"2001-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        grid_intensity(&dir)
            .args(["config", "set", "cache.file"])
            .arg(&cache_file)
            .assert()
            .success();

        grid_intensity(&dir)
            .args(["cache", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("CAISO_NORTH"));

        grid_intensity(&dir)
            .args(["cache", "clear"])
            .assert()
            .success();
        assert!(!cache_file.exists());
    }
}
