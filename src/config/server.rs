use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("licman.db")
    }

    /// HS256 signing secret written by `admin init`. `JWT_SECRET` in the
    /// environment takes precedence.
    #[must_use]
    pub fn jwt_secret_path(&self) -> PathBuf {
        self.data_dir.join(".jwt_secret")
    }

    #[must_use]
    pub fn admin_password_path(&self) -> PathBuf {
        self.data_dir.join(".admin_password")
    }

    /// Schools reference table used by the allocation step.
    #[must_use]
    pub fn schools_csv_path(&self) -> PathBuf {
        self.data_dir.join("DadosEscolas.csv")
    }

    /// Raw metrics payload dropped by the external collector.
    #[must_use]
    pub fn raw_metrics_path(&self) -> PathBuf {
        self.data_dir.join("canva_raw_latest.json")
    }

    /// Latest allocation snapshot served to dashboards.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("allocation_latest.json")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
        }
    }
}
