//! 导航状态机
//!
//! ```text
//! Idle ─navigate→ Listing ─content loaded→ Detail | Paginating
//! Paginating ─next page→ Listing
//! Paginating | Detail ─no next page→ Done
//! 任意状态 ─超时 / 异常页面→ Failed
//! ```

use std::fmt::Display;

/// 浏览器当前所处的页面状态（只在单个种子处理期间存在）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Idle,
    /// 已发起导航，等待内容加载
    Listing { page: u32 },
    /// 单公司详情页（无分页）
    Detail { page: u32 },
    /// 列表页，内容已加载，可能还有下一页
    Paginating { page: u32 },
    Done,
    Failed { reason: String },
}

/// 驱动状态转换的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Navigate,
    ContentLoaded { detail: bool },
    NextPage,
    NoNextPage,
    Fail(String),
}

impl PageState {
    /// 纯函数状态转换，非法转换进入 `Failed`
    pub fn transition(self, event: NavEvent) -> PageState {
        match (self, event) {
            (_, NavEvent::Fail(reason)) => PageState::Failed { reason },
            (PageState::Idle, NavEvent::Navigate) => PageState::Listing { page: 1 },
            (PageState::Listing { page }, NavEvent::ContentLoaded { detail: true }) => {
                PageState::Detail { page }
            }
            (PageState::Listing { page }, NavEvent::ContentLoaded { detail: false }) => {
                PageState::Paginating { page }
            }
            (PageState::Paginating { page }, NavEvent::NextPage) => {
                PageState::Listing { page: page + 1 }
            }
            (PageState::Paginating { .. } | PageState::Detail { .. }, NavEvent::NoNextPage) => {
                PageState::Done
            }
            (state, event) => PageState::Failed {
                reason: format!("非法状态转换: {state} + {event:?}"),
            },
        }
    }

    /// 当前页码
    pub fn page(&self) -> Option<u32> {
        match self {
            PageState::Listing { page }
            | PageState::Detail { page }
            | PageState::Paginating { page } => Some(*page),
            _ => None,
        }
    }

    /// 内容已加载，可以提取
    pub fn is_extractable(&self) -> bool {
        matches!(self, PageState::Detail { .. } | PageState::Paginating { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Done | PageState::Failed { .. })
    }
}

impl Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageState::Idle => write!(f, "Idle"),
            PageState::Listing { page } => write!(f, "Listing#{page}"),
            PageState::Detail { page } => write!(f, "Detail#{page}"),
            PageState::Paginating { page } => write!(f, "Paginating#{page}"),
            PageState::Done => write!(f, "Done"),
            PageState::Failed { reason } => write!(f, "Failed({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_flow_to_done() {
        let s = PageState::Idle.transition(NavEvent::Navigate);
        assert_eq!(s, PageState::Listing { page: 1 });
        let s = s.transition(NavEvent::ContentLoaded { detail: false });
        assert_eq!(s, PageState::Paginating { page: 1 });
        assert!(s.is_extractable());
        let s = s.transition(NavEvent::NextPage);
        assert_eq!(s, PageState::Listing { page: 2 });
        let s = s
            .transition(NavEvent::ContentLoaded { detail: false })
            .transition(NavEvent::NoNextPage);
        assert_eq!(s, PageState::Done);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_detail_page_finishes_without_pagination() {
        let s = PageState::Idle
            .transition(NavEvent::Navigate)
            .transition(NavEvent::ContentLoaded { detail: true });
        assert_eq!(s, PageState::Detail { page: 1 });
        assert_eq!(s.transition(NavEvent::NoNextPage), PageState::Done);
    }

    #[test]
    fn test_invalid_transitions_fail() {
        let s = PageState::Detail { page: 1 }.transition(NavEvent::NextPage);
        assert!(matches!(s, PageState::Failed { .. }));
        let s = PageState::Idle.transition(NavEvent::NextPage);
        assert!(matches!(s, PageState::Failed { .. }));
    }

    #[test]
    fn test_fail_from_any_state() {
        let s = PageState::Listing { page: 3 }.transition(NavEvent::Fail("timeout".into()));
        assert_eq!(
            s,
            PageState::Failed {
                reason: "timeout".into()
            }
        );
    }
}
