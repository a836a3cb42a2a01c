use clap::{Parser, ValueEnum};
use sheetpull_core::format::OutputFormat;
use sheetpull_core::params::{
    DEFAULT_FILENAME, DEFAULT_FOLDER, Endpoints, RunParameters, parse_delimiter,
};
use sheetpull_http::google::sheets::ValueRenderOption;
use url::Url;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum LoggingMode {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl From<LoggingMode> for logutil::LoggingMode {
    fn from(mode: LoggingMode) -> Self {
        match mode {
            LoggingMode::Pretty => logutil::LoggingMode::Pretty,
            LoggingMode::Json => logutil::LoggingMode::Json,
            LoggingMode::Compact => logutil::LoggingMode::Compact,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "sheetpull")]
#[clap(version)]
#[clap(about = "Copy a Google Sheets range to S3 as csv or parquet", long_about = None)]
pub struct Cli {
    /// Log verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format.
    #[clap(long = "log_mode", visible_alias = "log-mode", value_enum, env = "LOG_MODE")]
    pub log_mode: Option<LoggingMode>,

    #[clap(flatten)]
    pub job: GlueJobArgs,

    #[clap(flatten)]
    pub run: RunArgs,
}

/// Special parameters the job runner may forward to the script, besides the
/// ones with their own field.
const RUNNER_FLAGS: &[&str] = &[
    "job-language",
    "class",
    "scriptLocation",
    "extra-py-files",
    "extra-jars",
    "extra-files",
    "user-jars-first",
    "use-postgres-driver",
    "additional-python-modules",
    "python-modules-installer-option",
    "enable-glue-datacatalog",
    "enable-metrics",
    "enable-observability-metrics",
    "enable-continuous-cloudwatch-log",
    "enable-continuous-log-filter",
    "continuous-log-logGroup",
    "continuous-log-logStreamPrefix",
    "continuous-log-conversionPattern",
    "enable-spark-ui",
    "spark-event-logs-path",
    "enable-job-insights",
    "enable-auto-scaling",
    "enable-s3-parquet-optimized-committer",
    "enable-rename-algorithm-v2",
    "datalake-formats",
    "conf",
];

/// Arguments the job runner passes to every script. Accepted and logged,
/// otherwise unused.
#[derive(Debug, Clone, clap::Args)]
pub struct GlueJobArgs {
    #[clap(long = "JOB_NAME", hide = true)]
    pub job_name: Option<String>,

    #[clap(long = "JOB_ID", hide = true)]
    pub job_id: Option<String>,

    #[clap(long = "JOB_RUN_ID", hide = true)]
    pub job_run_id: Option<String>,

    #[clap(long = "TempDir", hide = true)]
    pub temp_dir: Option<String>,

    /// Values of any other runner flags, in order.
    #[clap(
        long = "job-bookmark-option",
        aliases = RUNNER_FLAGS,
        hide = true,
        allow_hyphen_values = true,
        action = clap::ArgAction::Append
    )]
    pub runner_args: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Name of the secret holding the service account key.
    #[clap(long = "google_secret_name", env = "GOOGLE_SECRET_NAME")]
    pub google_secret_name: String,

    /// Region of the secret.
    #[clap(long = "google_secret_region", env = "GOOGLE_SECRET_REGION")]
    pub google_secret_region: String,

    /// Spreadsheet id, as found in the sheet url.
    #[clap(long = "google_spreadsheet_id", env = "GOOGLE_SPREADSHEET_ID")]
    pub google_spreadsheet_id: String,

    /// Tab name or A1 range to read, e.g. "Sheet1!A1:D100".
    #[clap(long = "google_spreadsheet_tab", env = "GOOGLE_SPREADSHEET_TAB")]
    pub google_spreadsheet_tab: String,

    /// Destination bucket.
    #[clap(long, env = "BUCKET")]
    pub bucket: String,

    /// Key prefix inside the bucket, may be nested.
    #[clap(long, env = "FOLDER", default_value = DEFAULT_FOLDER)]
    pub folder: String,

    /// File name stem. A timestamp and extensions are appended.
    #[clap(long, env = "FILENAME", default_value = DEFAULT_FILENAME)]
    pub filename: String,

    /// Output format, csv or parquet.
    #[clap(long = "output_format", env = "OUTPUT_FORMAT", default_value = "csv")]
    pub output_format: OutputFormat,

    /// Compress the output. One of true, 1, t, y, yes enables it.
    #[clap(long, env = "COMPRESSION", default_value = "false")]
    pub compression: String,

    /// How the sheets api renders cells: FORMATTED_VALUE, UNFORMATTED_VALUE
    /// or FORMULA.
    #[clap(
        long = "value_render_option",
        env = "VALUE_RENDER_OPTION",
        default_value = "FORMATTED_VALUE"
    )]
    pub value_render_option: ValueRenderOption,

    /// Field delimiter for csv output.
    #[clap(
        long = "csv_delimiter",
        env = "CSV_DELIMITER",
        default_value = "\\t",
        value_parser = parse_delimiter
    )]
    pub csv_delimiter: u8,

    /// Region of the bucket, defaults to the secret region.
    #[clap(long = "s3_region", env = "S3_REGION")]
    pub s3_region: Option<String>,

    /// Custom object store endpoint, uses path style requests.
    #[clap(long = "s3_endpoint", env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<Url>,

    /// Custom secrets manager endpoint.
    #[clap(long = "secrets_endpoint", env = "SECRETS_ENDPOINT")]
    pub secrets_endpoint: Option<Url>,

    /// Custom sheets api endpoint.
    #[clap(long = "sheets_endpoint", env = "SHEETS_ENDPOINT")]
    pub sheets_endpoint: Option<Url>,
}

impl From<RunArgs> for RunParameters {
    fn from(args: RunArgs) -> Self {
        RunParameters {
            secret_name: args.google_secret_name,
            secret_region: args.google_secret_region,
            spreadsheet_id: args.google_spreadsheet_id,
            spreadsheet_tab: args.google_spreadsheet_tab,
            bucket: args.bucket,
            folder: args.folder,
            filename: args.filename,
            output_format: args.output_format,
            compression: args.compression,
            value_render_option: args.value_render_option,
            csv_delimiter: args.csv_delimiter,
            s3_region: args.s3_region,
            endpoints: Endpoints {
                secrets: args.secrets_endpoint,
                sheets: args.sheets_endpoint,
                s3: args.s3_endpoint,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use sheetpull_core::format::Compression;

    use super::*;

    const REQUIRED: &[&str] = &[
        "sheetpull",
        "--google_secret_name",
        "google",
        "--google_secret_region",
        "us-east-1",
        "--google_spreadsheet_id",
        "sheet-id",
        "--google_spreadsheet_tab",
        "Sheet1",
        "--bucket",
        "bucket",
    ];

    fn parse(extra: &[&str]) -> Cli {
        Cli::try_parse_from(REQUIRED.iter().chain(extra)).unwrap()
    }

    #[test]
    fn defaults() {
        let params = RunParameters::from(parse(&[]).run);
        assert_eq!(
            RunParameters::new("google", "us-east-1", "sheet-id", "Sheet1", "bucket"),
            params
        );
    }

    #[test]
    fn all_options() {
        let cli = parse(&[
            "--folder",
            "a/b",
            "--filename",
            "report",
            "--output_format",
            "parquet",
            "--compression",
            "yes",
            "--value_render_option",
            "UNFORMATTED_VALUE",
            "--csv_delimiter",
            ",",
            "--s3_region",
            "eu-west-1",
            "--s3_endpoint",
            "http://localhost:9000",
            "-vv",
            "--log_mode",
            "json",
            "--JOB_NAME",
            "pull-sheet",
        ]);
        assert_eq!(2, cli.verbose);
        assert!(matches!(cli.log_mode, Some(LoggingMode::Json)));
        assert_eq!(Some("pull-sheet".to_string()), cli.job.job_name);

        let params = RunParameters::from(cli.run);
        assert_eq!("a/b", params.folder);
        assert_eq!("report", params.filename);
        assert_eq!(OutputFormat::Parquet, params.output_format);
        assert_eq!(Some(Compression::Snappy), params.output_target().compression);
        assert_eq!(ValueRenderOption::UnformattedValue, params.value_render_option);
        assert_eq!(b',', params.csv_delimiter);
        assert_eq!("eu-west-1", params.s3_region());
        assert_eq!(
            Some("http://localhost:9000/"),
            params.endpoints.s3.as_ref().map(|u| u.as_str())
        );
    }

    #[test]
    fn runner_flags_accepted() {
        let cli = parse(&[
            "--JOB_ID",
            "j_123",
            "--JOB_RUN_ID",
            "jr_456",
            "--job-bookmark-option",
            "job-bookmark-disable",
            "--TempDir",
            "s3://glue-temp/tmp",
            "--enable-metrics",
            "true",
            "--enable-continuous-cloudwatch-log",
            "true",
            "--job-language",
            "python",
            "--conf",
            "-Dfoo=bar",
        ]);
        assert_eq!(Some("jr_456".to_string()), cli.job.job_run_id);
        assert_eq!(Some("s3://glue-temp/tmp".to_string()), cli.job.temp_dir);
        assert_eq!(
            vec!["job-bookmark-disable", "true", "true", "python", "-Dfoo=bar"],
            cli.job.runner_args
        );
        assert_eq!("bucket", cli.run.bucket);
    }

    #[test]
    fn unknown_flag_rejected() {
        let res = Cli::try_parse_from(REQUIRED.iter().chain(&["--not-a-flag", "x"]));
        assert!(res.is_err());
    }

    #[test]
    fn invalid_output_format() {
        let res = Cli::try_parse_from(REQUIRED.iter().chain(&["--output_format", "json"]));
        assert!(res.is_err());
    }

    #[test]
    fn missing_required() {
        let res = Cli::try_parse_from(["sheetpull", "--bucket", "bucket"]);
        assert!(res.is_err());
    }
}
