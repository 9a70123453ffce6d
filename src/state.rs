// state.rs - 扫描水位线存储
// 使用 sled 持久化每个监控目录最近一次成功扫描的开始时间

use anyhow::Result;
use sled::Db;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// 水位线存储
pub struct WatermarkStore {
    db: Db,
}

impl WatermarkStore {
    /// 水位线 key 前缀
    const WATERMARK_PREFIX: &'static str = "watermark:";

    /// 创建或打开数据库
    pub fn open(state_path: &Path) -> Result<Self> {
        let db = sled::open(state_path)?;
        info!("水位线数据库已加载: {}", state_path.display());
        Ok(Self { db })
    }

    fn watermark_key(dir: &Path) -> Vec<u8> {
        format!("{}{}", Self::WATERMARK_PREFIX, dir.display()).into_bytes()
    }

    /// 读取目录的水位线，None 表示从未成功扫描
    pub fn get(&self, dir: &Path) -> Result<Option<SystemTime>> {
        let Some(data) = self.db.get(Self::watermark_key(dir))? else {
            return Ok(None);
        };
        match bincode::deserialize::<Duration>(&data) {
            Ok(since_epoch) => Ok(Some(SystemTime::UNIX_EPOCH + since_epoch)),
            Err(e) => {
                // 无法解码的条目按未扫描处理
                warn!("水位线条目损坏 {}: {}", dir.display(), e);
                Ok(None)
            }
        }
    }

    /// 写入目录的水位线并落盘
    pub fn set(&self, dir: &Path, time: SystemTime) -> Result<()> {
        let since_epoch = time.duration_since(SystemTime::UNIX_EPOCH)?;
        let data = bincode::serialize(&since_epoch)?;
        self.db.insert(Self::watermark_key(dir), data)?;
        self.db.flush()?;
        Ok(())
    }

    /// 清除目录的水位线
    pub fn clear(&self, dir: &Path) -> Result<()> {
        self.db.remove(Self::watermark_key(dir))?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_set_watermark() {
        let temp_dir = tempdir().unwrap();
        let store = WatermarkStore::open(&temp_dir.path().join("state")).unwrap();
        let dir = Path::new("/images");

        assert_eq!(store.get(dir).unwrap(), None);

        let t = SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        store.set(dir, t).unwrap();
        assert_eq!(store.get(dir).unwrap(), Some(t));
        assert_eq!(store.get(Path::new("/other")).unwrap(), None);

        store.clear(dir).unwrap();
        assert_eq!(store.get(dir).unwrap(), None);
    }

    #[test]
    fn test_watermark_persists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state");
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        {
            let store = WatermarkStore::open(&path).unwrap();
            store.set(Path::new("/images"), t).unwrap();
        }
        let store = WatermarkStore::open(&path).unwrap();
        assert_eq!(store.get(Path::new("/images")).unwrap(), Some(t));
    }

    #[test]
    fn test_corrupt_entry_is_absent() {
        let temp_dir = tempdir().unwrap();
        let store = WatermarkStore::open(&temp_dir.path().join("state")).unwrap();
        store.db.insert(WatermarkStore::watermark_key(Path::new("/images")), &b"x"[..]).unwrap();
        assert_eq!(store.get(Path::new("/images")).unwrap(), None);
    }
}
