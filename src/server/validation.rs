use crate::server::response::ApiError;

const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' || c == '@'
}

/// Usernames are lowercased elsewhere; this only checks the shape.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username não pode ser vazio"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username não pode exceder {MAX_USERNAME_LEN} caracteres"
        )));
    }
    if !username.chars().all(is_valid_username_char) {
        return Err(ApiError::bad_request(
            "Username pode conter apenas letras, números, pontos, hífens e sublinhados",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("ana.paula").is_ok());
        assert!(validate_username("joao_felipe-2").is_ok());
        assert!(validate_username("ana@mbcentral.com.br").is_ok());
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
