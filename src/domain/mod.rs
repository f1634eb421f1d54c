//! Core domain model (spec §3).

pub mod address;
pub mod cart;
pub mod checkout_session;
pub mod compensation;
pub mod isbn;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment;
pub mod search_record;

pub use address::Address;
pub use cart::{CartItem, ShoppingCart};
pub use checkout_session::CheckoutSession;
pub use compensation::{CompensationLedger, FailureType};
pub use isbn::Isbn;
pub use money::Money;
pub use notification::{Notification, NotificationPreference, NotificationType};
pub use order::{Order, OrderItem, OrderStatus};
pub use payment::{PaymentAllocation, SellerSettlement};
pub use search_record::BookSearchRecord;
