pub mod core {
    pub mod gui;
}
pub mod interfaces {
    pub mod trainsim_interface;
}
