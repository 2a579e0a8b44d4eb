use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;

use tempfile::TempDir;

const SCHOOLS_CSV: &str = "\
id;name;status;cluster;carteira_saf;city;state;region;address;neighborhood;contact_phone;contact_email
257;Maple Bear Santa Maria;Operando;Potente;Tatiane;Santa Maria;RS;Sul;Rua A;Centro;;santamaria@maplebear.com.br
793;Maple Bear Arcoverde;Operando;Desenvolvimento;Ana;Arcoverde;PE;Nordeste;Rua B;Centro;;arcoverde@maplebear.com.br
";

const USERS_CSV: &str = "\
email;name;school_id;status_licenca
user1@santamaria.maplebear.com.br;User One;257;
user2@santamaria.maplebear.com.br;User Two;257;
user3@santamaria.maplebear.com.br;User Three;257;
outsider@gmail.com;Outsider;257;
teacher@arcoverde.maplebear.com.br;Teacher;793;licenciado
";

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_password: String,
    server_process: Option<Child>,
}

static BUILD_RELEASE: LazyLock<()> = LazyLock::new(|| {
    let build_status = Command::new("cargo")
        .args(["build", "--release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("build release binary");
    assert!(build_status.success(), "Failed to build release binary");
});

fn binary() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("target/release/licman")
}

impl TestServer {
    pub async fn start() -> Self {
        LazyLock::force(&BUILD_RELEASE);

        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();

        let init_output = Command::new(binary())
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .arg("--non-interactive")
            .output()
            .expect("run init");
        assert!(init_output.status.success(), "Failed to initialize database");

        let password_path = data_dir.join(".admin_password");
        let admin_password = std::fs::read_to_string(&password_path)
            .expect("read admin password")
            .trim()
            .to_string();

        Self::seed_data(data_dir);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(binary())
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_password,
            server_process: Some(server_process),
        }
    }

    fn seed_data(data_dir: &Path) {
        let schools_csv = data_dir.join("schools.csv");
        let users_csv = data_dir.join("users.csv");
        std::fs::write(&schools_csv, SCHOOLS_CSV).expect("write schools csv");
        std::fs::write(&users_csv, USERS_CSV).expect("write users csv");

        let import_output = Command::new(binary())
            .args(["admin", "import", "--data-dir"])
            .arg(data_dir)
            .arg("--schools")
            .arg(&schools_csv)
            .arg("--users")
            .arg(&users_csv)
            .output()
            .expect("run import");
        assert!(import_output.status.success(), "Failed to import seed data");
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Logs in and returns the session token, panicking on failure.
    pub async fn login_token(&self, username: &str, password: &str) -> String {
        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .post(format!("{}/auth/login", self.base_url))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .expect("login request")
            .json()
            .await
            .expect("parse login response");

        resp["data"]["token"]
            .as_str()
            .unwrap_or_else(|| panic!("no token in login response: {resp}"))
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
