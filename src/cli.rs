use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jacoco-lcov")]
#[command(about = "Convert JaCoCo execution data into an LCOV report", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Execution data files to load, in order
    #[arg(value_name = "EXECFILE")]
    pub execfiles: Vec<PathBuf>,

    /// Uninstrumented class file, directory or archive (repeatable)
    #[arg(long = "classfiles", value_name = "PATH")]
    pub classfiles: Vec<PathBuf>,

    /// Source root to resolve reported files against (repeatable)
    #[arg(long = "sourcepath", value_name = "PATH")]
    pub sourcepath: Vec<PathBuf>,

    /// LCOV file to write
    #[arg(short = 'o', long = "output", value_name = "DESTFILE")]
    pub output: PathBuf,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Fail on the first load error or mismatched class
    #[arg(long = "strict")]
    pub strict: bool,

    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "jacoco-lcov",
            "--classfiles",
            "build/classes",
            "--classfiles",
            "lib.jar",
            "--sourcepath",
            "src/main/java",
            "-o",
            "out.info",
            "-vv",
            "--strict",
            "a.exec",
            "b.exec",
        ])
        .unwrap();

        assert_eq!(cli.execfiles, vec![PathBuf::from("a.exec"), PathBuf::from("b.exec")]);
        assert_eq!(cli.classfiles.len(), 2);
        assert_eq!(cli.sourcepath, vec![PathBuf::from("src/main/java")]);
        assert_eq!(cli.output, PathBuf::from("out.info"));
        assert_eq!(cli.verbosity, 2);
        assert!(cli.strict);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_output_is_required() {
        let err = Cli::try_parse_from(["jacoco-lcov", "a.exec"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
