//! Bot filter: whitelist checked first, then blacklist, over the
//! `User-Agent` header. A missing User-Agent is logged and passed through.

use async_trait::async_trait;
use hyper::Response;
use tracing::warn;

use crate::config::Bot;
use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::matcher::CompiledMatcher;
use crate::pipeline::{BoxHandler, Handler, Middleware};

struct CompiledBot {
    #[allow(dead_code)]
    name: String,
    matcher: CompiledMatcher,
}

pub struct BotFilterMiddleware {
    enabled: bool,
    whitelist: Vec<CompiledBot>,
    blacklist: Vec<CompiledBot>,
}

impl BotFilterMiddleware {
    pub fn new(enabled: bool, whitelist: &[Bot], blacklist: &[Bot]) -> Result<Self, anyhow::Error> {
        let compile = |bots: &[Bot]| -> Result<Vec<CompiledBot>, anyhow::Error> {
            bots.iter()
                .map(|b| {
                    Ok(CompiledBot {
                        name: b.name.clone(),
                        matcher: CompiledMatcher::compile(&b.user_agent)
                            .map_err(|e| anyhow::anyhow!("{e}"))?,
                    })
                })
                .collect()
        };
        Ok(Self { enabled, whitelist: compile(whitelist)?, blacklist: compile(blacklist)? })
    }
}

#[async_trait]
impl Middleware for BotFilterMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        if !self.enabled {
            return next.handle(ctx).await;
        }

        let Some(ua) = ctx.header("user-agent").map(|s| s.to_string()) else {
            warn!("bot filter enabled but request has no User-Agent; passing through");
            return next.handle(ctx).await;
        };

        if self.whitelist.iter().any(|b| b.matcher.is_match(&ua)) {
            return next.handle(ctx).await;
        }
        if self.blacklist.iter().any(|b| b.matcher.is_match(&ua)) {
            return Err(ProxyError::Forbidden);
        }
        next.handle(ctx).await
    }
}
