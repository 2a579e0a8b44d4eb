mod common;

use common::test_server::TestServer;
use serde_json::{Value, json};

async fn create_staff_user(
    server: &TestServer,
    admin_token: &str,
    username: &str,
    password: &str,
    role: &str,
) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/admin/users", server.base_url))
        .bearer_auth(admin_token)
        .json(&json!({
            "username": username,
            "name": username,
            "password": password,
            "role": role,
        }))
        .send()
        .await
        .expect("create staff user");
    assert_eq!(resp.status(), 201, "failed to create {username}");
}

#[tokio::test]
async fn test_login_and_role_gating() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    // wrong password is a 401 with the uniform envelope
    let resp = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({"username": "admin", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    let admin_token = server.login_token("admin", &server.admin_password).await;

    // username lookup is case-insensitive
    let _ = server.login_token("ADMIN", &server.admin_password).await;

    create_staff_user(&server, &admin_token, "tatiane.barbosa", "password123", "agente").await;
    let agent_token = server.login_token("tatiane.barbosa", "password123").await;

    // agents can read schools
    let resp = client
        .get(format!("{}/schools", server.base_url))
        .bearer_auth(&agent_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // but not manage credentials or limits
    let resp = client
        .get(format!("{}/admin/users", server.base_url))
        .bearer_auth(&agent_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!("{}/schools/257/limit", server.base_url))
        .bearer_auth(&agent_token)
        .json(&json!({"newLimit": 5, "motivo": "teste"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // missing and garbage tokens are 401
    let resp = client
        .get(format!("{}/schools", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/schools", server.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_account_lockout() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let admin_token = server.login_token("admin", &server.admin_password).await;
    create_staff_user(&server, &admin_token, "jessika.queiroz", "password123", "agente").await;

    for _ in 0..5 {
        let resp = client
            .post(format!("{}/auth/login", server.base_url))
            .json(&json!({"username": "jessika.queiroz", "password": "bad"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    // locked out now, even with the correct password
    let resp = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({"username": "jessika.queiroz", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("bloqueada"));
}

#[tokio::test]
async fn test_license_lifecycle() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let token = server.login_token("admin", &server.admin_password).await;

    let assign = |email: &str| {
        let client = client.clone();
        let base_url = server.base_url.clone();
        let token = token.clone();
        let email = email.to_string();
        async move {
            client
                .post(format!("{base_url}/licenses/assign"))
                .bearer_auth(&token)
                .json(&json!({
                    "schoolId": "257",
                    "userEmail": email,
                    "motivo": "teste",
                    "ticket": "T-1",
                }))
                .send()
                .await
                .unwrap()
        }
    };

    // school 257 seeds with the default limit of 2
    let resp = assign("user1@santamaria.maplebear.com.br").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    // double assign is a business failure, not a server error
    let resp = assign("user1@santamaria.maplebear.com.br").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("já possui"));

    // non-compliant user cannot be licensed
    let resp = assign("outsider@gmail.com").await;
    assert_eq!(resp.status(), 400);

    let resp = assign("user2@santamaria.maplebear.com.br").await;
    assert_eq!(resp.status(), 200);

    // limit reached
    let resp = assign("user3@santamaria.maplebear.com.br").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("Limite"));

    // overview reflects the ledger
    let resp = client
        .get(format!("{}/schools", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let santa_maria = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "257")
        .unwrap();
    assert_eq!(santa_maria["used"], 2);
    assert_eq!(santa_maria["limit"], 2);
    assert_eq!(santa_maria["usage_status"], "full");

    // transfer moves the flag atomically
    let resp = client
        .post(format!("{}/licenses/transfer", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "schoolId": "257",
            "fromEmail": "user1@santamaria.maplebear.com.br",
            "toEmail": "user3@santamaria.maplebear.com.br",
            "motivo": "teste",
            "ticket": "T-2",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/schools/257/users", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let users = body["data"].as_array().unwrap();
    let licensed: Vec<&str> = users
        .iter()
        .filter(|u| u["has_canva"] == true)
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(licensed.len(), 2);
    assert!(licensed.contains(&"user2@santamaria.maplebear.com.br"));
    assert!(licensed.contains(&"user3@santamaria.maplebear.com.br"));

    // revoke, then revoking again fails
    let revoke_body = json!({
        "schoolId": "257",
        "userEmail": "user2@santamaria.maplebear.com.br",
        "motivo": "saiu",
        "ticket": "T-3",
    });
    let resp = client
        .post(format!("{}/licenses/revoke", server.base_url))
        .bearer_auth(&token)
        .json(&revoke_body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/licenses/revoke", server.base_url))
        .bearer_auth(&token)
        .json(&revoke_body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // unknown school is a 404
    let resp = client
        .post(format!("{}/licenses/assign", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"schoolId": "999", "userEmail": "x@santamaria.maplebear.com.br"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_limits_and_audit() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let token = server.login_token("admin", &server.admin_password).await;

    // change one school's limit
    let resp = client
        .post(format!("{}/schools/257/limit", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"newLimit": 5, "motivo": "expansão"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // negative limits never pass validation
    let resp = client
        .post(format!("{}/schools/257/limit", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"newLimit": -1, "motivo": "teste"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // global limit: read, then set for all schools
    let resp = client
        .get(format!("{}/license_limit", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["default"], 2);

    let resp = client
        .post(format!("{}/license_limit", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"newLimit": 3, "motivo": "nova política"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["updated"], 2);

    // audit log: one alter_limit row for the single change plus one per
    // school for the global change, newest first
    let resp = client
        .get(format!(
            "{}/audit?action=alter_limit",
            server.base_url
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["payload"]["new_limit"], 3);

    // actor filter is a case-insensitive substring
    let resp = client
        .get(format!("{}/audit?actor=ADM", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    // CSV export with the fixed column order
    let resp = client
        .get(format!("{}/audit?export=csv", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let csv = resp.text().await.unwrap();
    assert!(csv.starts_with("Data/Hora,Ação,Escola ID,Escola,Usuário,Detalhes"));
}

#[tokio::test]
async fn test_admin_credential_management() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let admin_token = server.login_token("admin", &server.admin_password).await;

    create_staff_user(&server, &admin_token, "ana.paula", "password123", "coordenadora").await;

    // duplicate username conflicts
    let resp = client
        .post(format!("{}/admin/users", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({
            "username": "ANA.PAULA",
            "name": "Ana",
            "password": "password123",
            "role": "agente",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // unmapped roles are invalid, not defaulted
    let resp = client
        .post(format!("{}/admin/users", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({
            "username": "someone",
            "name": "Someone",
            "password": "password123",
            "role": "superuser",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // listing never exposes password hashes
    let resp = client
        .get(format!("{}/admin/users", server.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    // coordinators can read audit but not manage credentials
    let coord_token = server.login_token("ana.paula", "password123").await;
    let resp = client
        .get(format!("{}/audit", server.base_url))
        .bearer_auth(&coord_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/admin/users", server.base_url))
        .bearer_auth(&coord_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // password change takes effect
    let resp = client
        .put(format!("{}/admin/users/password", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": "ana.paula", "new_password": "renewed-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let _ = server.login_token("ana.paula", "renewed-password").await;

    // role change to an unknown user 404s
    let resp = client
        .put(format!("{}/admin/users/role", server.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": "ghost", "new_role": "agente"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_reload_and_snapshot() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let token = server.login_token("admin", &server.admin_password).await;

    // no snapshot yet
    let resp = client
        .get(format!("{}/data/latest", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // drop a raw payload and the schools reference table, then reload
    std::fs::write(
        server.data_dir().join("canva_raw_latest.json"),
        serde_json::to_string(&json!({
            "timestamp": 1731520245000i64,
            "periodo_filtro": "Últimos 30 dias",
            "usuarios": [
                {"nome": "Andressa", "email": "andressa@santamaria.maplebear.com.br", "funcao": "Estudante"},
                {"nome": "Admin Teste", "email": "admin@escola.com", "funcao": "Administrador"}
            ]
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        server.data_dir().join("DadosEscolas.csv"),
        "ID da Escola;Nome da Escola;E-mail da Escola\n\
         257;Maple Bear Santa Maria;santamaria.maplebear.com.br\n",
    )
    .unwrap();

    let resp = client
        .post(format!("{}/admin/reload-data", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allocated"], 1);
    assert_eq!(body["data"]["unallocated"], 1);

    // snapshot is now served
    let resp = client
        .get(format!("{}/data/latest", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let allocations = body["data"]["schools_allocation"].as_array().unwrap();
    assert_eq!(allocations.len(), 2); // one school + unallocated bucket
    assert_eq!(body["data"]["unallocated_users_count"], 1);

    // the reload left an audit trail
    let resp = client
        .get(format!("{}/audit?action=reload_data", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["actor"], "admin");
}
