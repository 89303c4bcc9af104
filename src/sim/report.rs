// Run reports: a snapshot taken when the main phase ends, and the full
// result including the post-convergence accuracy figures.

/// Measurements frozen at the end of the main phase.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseReport {
    pub presence_updates: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub messages_per_second: f64,
    pub average_convergence_time: u64,
    pub average_sleep_time: u64,
}

impl PhaseReport {
    pub fn print(&self) {
        println!("Total Presence Updates: {}", self.presence_updates);
        println!("Total Messages Sent:    {}", self.messages_sent);
        println!("Total Messages Dropped: {}", self.messages_dropped);
        println!("Messages / Second:      {}", self.messages_per_second);
        println!("Average Time to Converge: {}", self.average_convergence_time);
        println!("Average Sleep Time:       {}", self.average_sleep_time);
    }
}

/// Complete simulation result.
#[derive(Clone, Debug, PartialEq)]
pub struct SimReport {
    pub main_phase: PhaseReport,
    pub total_buddy_records: u64,
    pub total_correct_buddy_records: u64,
    pub accuracy_rate: f64,
}

impl SimReport {
    pub fn print(&self) {
        self.main_phase.print();
        println!("Total Buddy Records:          {}", self.total_buddy_records);
        println!(
            "Total Correct Buddy Records:  {}",
            self.total_correct_buddy_records
        );
        println!("Accuracy Rate:                {}", self.accuracy_rate);
    }
}
