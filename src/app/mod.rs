//! Application use cases and transactions.

mod client;
mod deal;
mod invoice;
mod machine;
mod order;
mod payment;
mod returns;
mod shipment;
mod user;

pub use client::{
    client_create, client_delete, client_get, client_list, client_update, ClientCreateReq,
    ClientDto, ClientUpdateReq,
};
pub use deal::{
    deal_create, deal_delete, deal_get, deal_list, deal_update, DealCreateReq, DealDto,
    DealUpdateReq,
};
pub use invoice::{
    invoice_create, invoice_delete, invoice_get, invoice_list, invoice_paid_total,
    invoice_update, InvoiceCreateReq, InvoiceDto, InvoiceListReq, InvoiceUpdateReq,
};
pub use machine::{
    machine_create, machine_delete, machine_get, machine_list, machine_update, MachineCreateReq,
    MachineDto, MachineUpdateReq,
};
pub use order::{
    deal_order_create, deal_order_delete, deal_order_get, deal_order_list, deal_order_update,
    DealOrderCreateReq, DealOrderDto, DealOrderListReq, DealOrderUpdateReq,
};
pub use payment::{
    payment_create, payment_deactivate, payment_delete, payment_get, payment_list,
    payment_update, PaymentCreateReq, PaymentDto, PaymentUpdateReq,
};
pub use returns::{
    return_create, return_delete, return_get, return_list, return_update, ReturnCreateReq,
    ReturnDto, ReturnUpdateReq,
};
pub use shipment::{
    shipment_create, shipment_delete, shipment_get, shipment_list, shipment_update,
    ShipmentCreateReq, ShipmentDto, ShipmentUpdateReq,
};
pub use user::{
    user_create, user_delete, user_get, user_list, user_update, user_verify_password,
    UserCreateReq, UserData, UserDto, UserUpdateReq,
};
