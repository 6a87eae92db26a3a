//! `define`: publish the compile-time constants.

use super::{BuildContext, Stage};
use anyhow::Result;

pub struct Define;

impl Stage for Define {
    fn name(&self) -> &'static str {
        "define"
    }

    fn setup(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        ctx.defines = ctx.env.constants();
        crate::debug!("define"; "{} constants, revision {}", ctx.defines.len(), ctx.env.revision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing::{env, project};

    #[test]
    fn test_constants_published() {
        let (_dir, config) = project(&[]);
        let env = env(&config, &[("API_PREFIX", "api"), ("FEATURE_X", "on")]);
        let mut ctx = BuildContext::new(&config, &env).unwrap();
        assert!(ctx.defines.is_empty());

        Define.setup(&mut ctx).unwrap();
        assert_eq!(ctx.defines.get("API_PREFIX"), Some("\"/api/\""));
        assert_eq!(ctx.defines.get("FEATURE_X"), Some("\"on\""));
        assert_eq!(ctx.defines.get("GIT_SHA"), Some("\"test\""));
    }
}
