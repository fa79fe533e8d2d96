use serde::Serialize;

#[derive(Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub aggregation_timezone: String,
    pub db_path: String,
    pub app_data_dir: String,
}
