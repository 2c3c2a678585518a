//! User-facing text for the gateway's payment response codes.

pub const SUCCESS: &str = "00";

pub fn is_success(code: &str) -> bool {
    code == SUCCESS
}

pub fn describe(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Funds deducted; the transaction is flagged as suspicious (possible fraud)",
        "09" => "Card or account is not registered for internet banking",
        "10" => "Card or account verification failed more than 3 times",
        "11" => "Payment window expired; please retry the transaction",
        "12" => "Card or account is locked",
        "13" => "Wrong one-time password; please retry the transaction",
        "24" => "Transaction canceled by the customer",
        "51" => "Insufficient account balance",
        "65" => "Account exceeded its daily transaction limit",
        "75" => "Issuing bank is under maintenance",
        "79" => "Wrong payment password entered too many times; please retry",
        "99" => "Other error",
        _ => "Unknown response code",
    }
}
