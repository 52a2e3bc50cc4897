//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。
//! 配信は `Broadcaster` トレイト越しに行い、トランスポートには依存しません。

pub mod broadcaster;
pub mod error;
pub mod messaging;
pub mod notification;
pub mod presence;
pub mod room_membership;
pub mod router;
pub mod session;

pub use broadcaster::Broadcaster;
pub use error::{MembershipError, MessagingError, NotificationError, SessionError};
pub use messaging::MessagingUseCase;
pub use notification::{NotificationDelivery, NotificationUseCase};
pub use presence::PresenceUseCase;
pub use room_membership::RoomMembershipUseCase;
pub use router::{EventRouter, RouterConfig};
pub use session::SessionUseCase;
