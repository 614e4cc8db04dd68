use tracing::{debug, warn};

use crate::config::AccessConfig;
use crate::utils::{FipeError, FipeResult};

/// 共享密码校验，与提取流程无关
pub struct AccessGate {
    password: Option<String>,
}

impl AccessGate {
    pub fn new(config: &AccessConfig) -> Self {
        let password = Some(config.password.trim().to_string()).filter(|p| !p.is_empty());
        Self { password }
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn verify(&self, supplied: Option<&str>) -> FipeResult<()> {
        let Some(expected) = self.password.as_deref() else {
            debug!("未配置访问密码，跳过校验");
            return Ok(());
        };

        match supplied {
            Some(given) if given == expected => Ok(()),
            Some(_) => {
                warn!("访问密码错误");
                Err(FipeError::AccessDenied("密码错误".to_string()))
            }
            None => Err(FipeError::AccessDenied(
                "需要密码，请使用 --password".to_string(),
            )),
        }
    }
}
