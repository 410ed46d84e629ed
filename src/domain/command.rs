//! Startup command line of the Kafka UI JVM

use itertools::Itertools;

/// Name of the file, inside the config directory, that Spring picks up as
/// additional configuration.
pub const APPLICATION_CONFIG_FILE: &str = "application-local.yml";

/// Builder for the `java ...` command the supervisor runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvmCommand {
    pub config_dir: String,
    /// Fixed heap size, used for both `-Xms` and `-Xmx`.
    pub heap: String,
    /// Garbage collector flag without the `-XX:+` prefix.
    pub gc: String,
    pub add_opens: Vec<String>,
    pub jar: String,
}

impl JvmCommand {
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            "java".to_string(),
            format!(
                "-Dspring.config.additional-location={}/{}",
                self.config_dir.trim_end_matches('/'),
                APPLICATION_CONFIG_FILE
            ),
        ];
        for module in &self.add_opens {
            argv.push("--add-opens".to_string());
            argv.push(module.clone());
        }
        argv.push(format!("-Xms{}", self.heap));
        argv.push(format!("-Xmx{}", self.heap));
        argv.push(format!("-XX:+{}", self.gc));
        argv.push("-jar".to_string());
        argv.push(self.jar.clone());
        argv
    }

    pub fn command_line(&self) -> String {
        self.argv().iter().join(" ")
    }
}
