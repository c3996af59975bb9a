use alloy::sol;

sol! {
    /// Home-chain travel contract. Locks frogs on departure and unlocks
    /// them once the return message is observed.
    #[sol(rpc)]
    interface IOmniTravel {
        event ProvisionsRefunded(uint256 indexed tokenId, uint256 remaining, uint256 used);

        event ExplorationTriggered(uint256 indexed tokenId, uint256 targetChainId, string observation, uint256 timestamp);

        function unlockFrogFromCrossChain(uint256 tokenId, bytes32 returnMessageId, uint256 xpEarned) external;

        function triggerExploration(uint256 tokenId, string calldata observation, uint256 minReserve) external;
    }
}
