//! The extract and load routine.
//!
//! Stages run strictly in order: load the credential from the secret store,
//! fetch the sheet range, convert it to a table, persist the table. Any error
//! stops the run.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sheetpull_error::Result;
use sheetpull_http::aws::credentials::AwsCredentials;
use sheetpull_http::aws::s3::S3Client;
use sheetpull_http::aws::secrets::SecretsManagerClient;
use sheetpull_http::client::HttpClient;
use sheetpull_http::google::credentials::ServiceAccount;
use sheetpull_http::google::sheets::{SHEETS_READ_SCOPES, SheetsClient, ValueRenderOption};
use tracing::info;

use crate::params::RunParameters;
use crate::persist::{OutputArtifact, persist};
use crate::table::{SheetValueRange, Table};

/// Source of the write timestamp.
pub trait Clock: Debug + Sync + Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fetch a service account key stored as a json secret.
pub async fn load_credential<C>(
    secrets: &SecretsManagerClient<C>,
    secret_id: &str,
) -> Result<ServiceAccount>
where
    C: HttpClient,
{
    let secret = secrets.get_secret_string(secret_id).await?;
    let credential = ServiceAccount::try_from_str(secret.expose())?;
    info!(
        %secret_id,
        region = %secrets.region(),
        client_email = %credential.client_email(),
        "loaded credential"
    );
    Ok(credential)
}

/// Authenticate with the credential and fetch a range.
///
/// The credential is consumed, it's dropped as soon as the access token has
/// been obtained.
pub async fn fetch_range<C>(
    client: &C,
    sheets: &SheetsClient<C>,
    credential: ServiceAccount,
    spreadsheet_id: &str,
    range: &str,
    render: ValueRenderOption,
) -> Result<SheetValueRange>
where
    C: HttpClient,
{
    let token = credential
        .fetch_access_token(client, SHEETS_READ_SCOPES)
        .await?;
    drop(credential);

    let values = sheets
        .get_values(&token, spreadsheet_id, range, render)
        .await?;
    let range_values = SheetValueRange::from(values);
    info!(
        %spreadsheet_id,
        %range,
        rows = range_values.rows.len(),
        "fetched sheet range"
    );

    Ok(range_values)
}

#[derive(Debug)]
pub struct Pipeline<C: HttpClient, K: Clock> {
    client: C,
    aws_credentials: AwsCredentials,
    clock: K,
}

impl<C> Pipeline<C, SystemClock>
where
    C: HttpClient,
{
    pub fn with_system_clock(client: C, aws_credentials: AwsCredentials) -> Self {
        Self::new(client, aws_credentials, SystemClock)
    }
}

impl<C, K> Pipeline<C, K>
where
    C: HttpClient,
    K: Clock,
{
    pub fn new(client: C, aws_credentials: AwsCredentials, clock: K) -> Self {
        Pipeline {
            client,
            aws_credentials,
            clock,
        }
    }

    /// Run every stage once.
    pub async fn run(&self, params: &RunParameters) -> Result<OutputArtifact> {
        params.validate()?;
        let target = params.output_target();

        let mut secrets = SecretsManagerClient::try_new(
            self.client.clone(),
            self.aws_credentials.clone(),
            params.secret_region.as_str(),
        )?;
        if let Some(endpoint) = &params.endpoints.secrets {
            secrets = secrets.with_endpoint(endpoint.clone());
        }
        let credential = load_credential(&secrets, &params.secret_name).await?;

        let mut sheets = SheetsClient::new(self.client.clone());
        if let Some(endpoint) = &params.endpoints.sheets {
            sheets = sheets.with_endpoint(endpoint.clone());
        }
        let range = fetch_range(
            &self.client,
            &sheets,
            credential,
            &params.spreadsheet_id,
            &params.spreadsheet_tab,
            params.value_render_option,
        )
        .await?;

        let table = Table::try_from_value_range(range)?;
        info!(
            columns = table.num_columns(),
            rows = table.num_rows(),
            "converted range to table"
        );

        let mut store = S3Client::new(
            self.client.clone(),
            self.aws_credentials.clone(),
            params.s3_region(),
        );
        if let Some(endpoint) = &params.endpoints.s3 {
            store = store.with_endpoint(endpoint.clone());
        }

        persist(&table, &target, &store, self.clock.now()).await
    }
}
