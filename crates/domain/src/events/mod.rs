//! 事件信封
//!
//! 三类事件共享同一约定：`stamp` 在发布时刻填充事件 id 与时间戳，
//! `routing_key` 决定事件投递到哪个队列。

pub mod analytics_event;
pub mod notification_event;
pub mod product_event;

pub use analytics_event::{AnalyticsContext, AnalyticsEvent, AnalyticsEventKind};
pub use notification_event::{NotificationChannel, NotificationEvent, NotificationPriority};
pub use product_event::{ProductEvent, ProductEventKind};
