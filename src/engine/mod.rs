// ==========================================
// 线索导入引擎 - 引擎层
// ==========================================
// 职责: 分配计算、批量改派、导入会话编排
// 红线: Engine 不拼 SQL，数据读写经由 Repository trait
// ==========================================

pub mod allocator;
pub mod cancellation;
pub mod reassignment;
pub mod session;

// 重导出核心引擎
pub use allocator::{allocate, partition, AllocationError, AllocationPlan, Assignment};
pub use cancellation::CancellationSignal;
pub use reassignment::{ReassignmentService, ReassignmentSummary};
pub use session::{ImportSession, SessionConfig};
