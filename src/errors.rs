use std::fmt;

#[derive(Debug, Clone)]
pub enum DriplnkError {
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Validation(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    KvStore(String),
    Serialization(String),
    FileOperation(String),
    Snapshot(String),
    ObjectStore(String),
    Migration(String),
    Internal(String),
}

impl DriplnkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            DriplnkError::NotFound(_) => "E001",
            DriplnkError::Conflict(_) => "E002",
            DriplnkError::Unauthorized(_) => "E003",
            DriplnkError::Validation(_) => "E004",
            DriplnkError::DatabaseConfig(_) => "E005",
            DriplnkError::DatabaseConnection(_) => "E006",
            DriplnkError::DatabaseOperation(_) => "E007",
            DriplnkError::KvStore(_) => "E008",
            DriplnkError::Serialization(_) => "E009",
            DriplnkError::FileOperation(_) => "E010",
            DriplnkError::Snapshot(_) => "E011",
            DriplnkError::ObjectStore(_) => "E012",
            DriplnkError::Migration(_) => "E013",
            DriplnkError::Internal(_) => "E014",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            DriplnkError::NotFound(_) => "Resource Not Found",
            DriplnkError::Conflict(_) => "Resource Already Exists",
            DriplnkError::Unauthorized(_) => "Unauthorized",
            DriplnkError::Validation(_) => "Validation Error",
            DriplnkError::DatabaseConfig(_) => "Database Configuration Error",
            DriplnkError::DatabaseConnection(_) => "Database Connection Error",
            DriplnkError::DatabaseOperation(_) => "Database Operation Error",
            DriplnkError::KvStore(_) => "KV Store Error",
            DriplnkError::Serialization(_) => "Serialization Error",
            DriplnkError::FileOperation(_) => "File Operation Error",
            DriplnkError::Snapshot(_) => "Snapshot Error",
            DriplnkError::ObjectStore(_) => "Object Store Error",
            DriplnkError::Migration(_) => "Migration Error",
            DriplnkError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            DriplnkError::NotFound(msg)
            | DriplnkError::Conflict(msg)
            | DriplnkError::Unauthorized(msg)
            | DriplnkError::Validation(msg)
            | DriplnkError::DatabaseConfig(msg)
            | DriplnkError::DatabaseConnection(msg)
            | DriplnkError::DatabaseOperation(msg)
            | DriplnkError::KvStore(msg)
            | DriplnkError::Serialization(msg)
            | DriplnkError::FileOperation(msg)
            | DriplnkError::Snapshot(msg)
            | DriplnkError::ObjectStore(msg)
            | DriplnkError::Migration(msg)
            | DriplnkError::Internal(msg) => msg,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DriplnkError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DriplnkError::Conflict(_))
    }

    /// 存储引擎层面的故障（I/O、数据损坏、连接失败等）
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            DriplnkError::NotFound(_)
                | DriplnkError::Conflict(_)
                | DriplnkError::Unauthorized(_)
                | DriplnkError::Validation(_)
        )
    }

    /// 在消息前附加实体/操作上下文，保留错误种类
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            DriplnkError::NotFound(m) => DriplnkError::NotFound(wrap(m)),
            DriplnkError::Conflict(m) => DriplnkError::Conflict(wrap(m)),
            DriplnkError::Unauthorized(m) => DriplnkError::Unauthorized(wrap(m)),
            DriplnkError::Validation(m) => DriplnkError::Validation(wrap(m)),
            DriplnkError::DatabaseConfig(m) => DriplnkError::DatabaseConfig(wrap(m)),
            DriplnkError::DatabaseConnection(m) => DriplnkError::DatabaseConnection(wrap(m)),
            DriplnkError::DatabaseOperation(m) => DriplnkError::DatabaseOperation(wrap(m)),
            DriplnkError::KvStore(m) => DriplnkError::KvStore(wrap(m)),
            DriplnkError::Serialization(m) => DriplnkError::Serialization(wrap(m)),
            DriplnkError::FileOperation(m) => DriplnkError::FileOperation(wrap(m)),
            DriplnkError::Snapshot(m) => DriplnkError::Snapshot(wrap(m)),
            DriplnkError::ObjectStore(m) => DriplnkError::ObjectStore(wrap(m)),
            DriplnkError::Migration(m) => DriplnkError::Migration(wrap(m)),
            DriplnkError::Internal(m) => DriplnkError::Internal(wrap(m)),
        }
    }
}

impl fmt::Display for DriplnkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for DriplnkError {}

// 便捷的构造函数
impl DriplnkError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        DriplnkError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Conflict(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Unauthorized(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Validation(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        DriplnkError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        DriplnkError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        DriplnkError::DatabaseOperation(msg.into())
    }

    pub fn kv_store<T: Into<String>>(msg: T) -> Self {
        DriplnkError::KvStore(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Serialization(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        DriplnkError::FileOperation(msg.into())
    }

    pub fn snapshot<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Snapshot(msg.into())
    }

    pub fn object_store<T: Into<String>>(msg: T) -> Self {
        DriplnkError::ObjectStore(msg.into())
    }

    pub fn migration<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Migration(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        DriplnkError::Internal(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for DriplnkError {
    fn from(err: sea_orm::DbErr) -> Self {
        use sea_orm::SqlErr;

        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => DriplnkError::Conflict(msg),
            // 唯一会触发外键约束的写入是保存链接：所有者用户不存在
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                DriplnkError::NotFound(format!("owner user not found: {}", msg))
            }
            _ => DriplnkError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<sled::Error> for DriplnkError {
    fn from(err: sled::Error) -> Self {
        DriplnkError::KvStore(err.to_string())
    }
}

impl From<std::io::Error> for DriplnkError {
    fn from(err: std::io::Error) -> Self {
        DriplnkError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for DriplnkError {
    fn from(err: serde_json::Error) -> Self {
        DriplnkError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for DriplnkError {
    fn from(err: zip::result::ZipError) -> Self {
        DriplnkError::Snapshot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DriplnkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_helpers() {
        assert!(DriplnkError::not_found("user x").is_not_found());
        assert!(DriplnkError::conflict("handle taken").is_conflict());
        assert!(!DriplnkError::conflict("handle taken").is_internal());
        assert!(DriplnkError::kv_store("io").is_internal());
        assert!(DriplnkError::database_operation("boom").is_internal());
    }

    #[test]
    fn test_with_context_keeps_kind() {
        let err = DriplnkError::not_found("id=42").with_context("link get");
        assert!(err.is_not_found());
        assert_eq!(err.message(), "link get: id=42");
        assert_eq!(err.code(), "E001");
    }

    #[test]
    fn test_db_err_maps_to_database_operation() {
        let err: DriplnkError = sea_orm::DbErr::Custom("broken".into()).into();
        assert!(matches!(err, DriplnkError::DatabaseOperation(_)));
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = DriplnkError::snapshot("archive truncated");
        assert_eq!(err.to_string(), "Snapshot Error: archive truncated");
    }
}
