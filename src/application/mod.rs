// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor math, no printing.
// Each use case wires data, infra and ml together for one
// command.
//
// Reference: Clean Architecture pattern

// Annotations → vocabulary → datasets → training loop
pub mod train_use_case;

// Checkpoint → captioner → text for one image
pub mod caption_use_case;
