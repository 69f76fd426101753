pub mod models;
pub mod machine;
pub mod locks;
pub mod repository;
pub mod memory;
pub mod escrow;
pub mod dispute;
pub mod finance;
pub mod coordinator;

pub use coordinator::{CreateOrderRequest, ListOrders, OrderCoordinator, OrderPage, PartyRole, TradeSettings};
pub use dispute::DisputeResolver;
pub use escrow::{EscrowGateway, PaymentDetails, SimulatedLedger};
pub use finance::{FinancialManager, OrderStats};
pub use machine::{OrderStateMachine, ShipmentDetails, StockEffect, TransitionRequest};
pub use memory::MemoryOrderRepository;
pub use models::{Order, OrderStatus, PaymentStatus, DisputeStatus, DeliveryAddress, PaymentMethod};
pub use repository::{OrderQuery, OrderRepository, OrderStore, OutboxRecord};
