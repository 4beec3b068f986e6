// 文件持久化状态存储实现
//
// 每个键对应数据目录下的一个 JSON 文件，写入先落临时文件再原子重命名

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::modules::chat::ports::{RepositoryError, StateStorage};

/// 文件状态存储
pub struct FileStateStorage {
    data_dir: PathBuf,
}

impl FileStateStorage {
    /// 创建新的文件状态存储
    ///
    /// # Arguments
    /// * `data_dir` - 应用数据目录路径
    pub async fn new(data_dir: PathBuf) -> Result<Self, RepositoryError> {
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| RepositoryError::StorageError(e.to_string()))?;

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 键到文件路径；非法字符替换为下划线
    fn path_for(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.data_dir.join(format!("{}.json", file_stem))
    }
}

#[async_trait]
impl StateStorage for FileStateStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RepositoryError::StorageError(e.to_string())),
        }
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), RepositoryError> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, blob)
            .await
            .map_err(|e| RepositoryError::StorageError(e.to_string()))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| RepositoryError::StorageError(e.to_string()))?;

        tracing::trace!("[FileStateStorage] Wrote {} bytes to {:?}", blob.len(), path);
        Ok(())
    }
}
